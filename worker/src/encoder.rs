use comms::{Msg, OnoSender, Tag, tags};
use log::debug;
use tokio::io::AsyncWrite;

use crate::{Result, result::SubResult};

/// Sends the results of a batch back to the coordinator.
///
/// The amount of results goes first, then every element of every result under its own tag.
/// Tags start at `tags::RESULT_BASE` and keep increasing across the whole batch.
///
/// # Returns
/// The tag following the last element sent.
pub async fn send_results<W>(tx: &mut OnoSender<W>, results: &[SubResult]) -> Result<Tag>
where
    W: AsyncWrite + Unpin,
{
    let count = [results.len() as i32];
    tx.send(tags::DATA, &Msg::Int(&count)).await?;

    let mut tag = tags::RESULT_BASE;
    for result in results {
        for element in result.elements() {
            tx.send(tag, &element.msg()).await?;
            tag += 1;
        }
    }

    debug!(results = results.len(), last_tag = tag; "batch results sent");
    Ok(tag)
}
