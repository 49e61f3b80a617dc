use std::borrow::Cow;

use comms::Msg;
use ndarray::{Array, Array1, Array2, Dimension};

/// The answer to a single sub-task.
#[derive(Debug, Clone, PartialEq)]
pub enum SubResult {
    Statistics {
        nobs: i32,
        /// Responsibility mass of every component.
        totals: Array1<f64>,
        /// `ncomp x ndim` responsibility weighted sums of the observations.
        weighted_sums: Array2<f64>,
        /// `nobs x ncomp` normalized responsibilities.
        responsibilities: Array2<f64>,
        loglik: f64,
        gid: i32,
    },
    Labels {
        nobs: i32,
        labels: Vec<i32>,
        gid: i32,
    },
    Relabel {
        nobs: i32,
        labels: Vec<i32>,
        gid: i32,
        hard: Vec<i32>,
    },
}

/// A single message of a result, in its wire type.
#[derive(Debug, Clone, PartialEq)]
pub enum Element<'a> {
    Int(Cow<'a, [i32]>),
    Double(Cow<'a, [f64]>),
}

impl Element<'_> {
    pub fn msg(&self) -> Msg<'_> {
        match self {
            Element::Int(nums) => Msg::Int(nums),
            Element::Double(nums) => Msg::Double(nums),
        }
    }
}

impl SubResult {
    pub fn gid(&self) -> i32 {
        match self {
            SubResult::Statistics { gid, .. }
            | SubResult::Labels { gid, .. }
            | SubResult::Relabel { gid, .. } => *gid,
        }
    }

    /// The messages this result is sent as, in wire order.
    pub fn elements(&self) -> Vec<Element<'_>> {
        match self {
            SubResult::Statistics {
                nobs,
                totals,
                weighted_sums,
                responsibilities,
                loglik,
                gid,
            } => vec![
                scalar_int(*nobs),
                Element::Double(row_major(totals)),
                Element::Double(row_major(weighted_sums)),
                Element::Double(row_major(responsibilities)),
                Element::Double(Cow::Owned(vec![*loglik])),
                scalar_int(*gid),
            ],
            SubResult::Labels { nobs, labels, gid } => vec![
                scalar_int(*nobs),
                Element::Int(Cow::Borrowed(labels)),
                scalar_int(*gid),
            ],
            SubResult::Relabel {
                nobs,
                labels,
                gid,
                hard,
            } => vec![
                scalar_int(*nobs),
                Element::Int(Cow::Borrowed(labels)),
                scalar_int(*gid),
                Element::Int(Cow::Borrowed(hard)),
            ],
        }
    }
}

fn scalar_int<'a>(value: i32) -> Element<'a> {
    Element::Int(Cow::Owned(vec![value]))
}

/// Borrows the array's buffer when it is already row-major, copies it otherwise.
fn row_major<D: Dimension>(array: &Array<f64, D>) -> Cow<'_, [f64]> {
    match array.as_slice() {
        Some(slice) => Cow::Borrowed(slice),
        None => Cow::Owned(array.iter().copied().collect()),
    }
}
