use std::io::{self, Read, Write};

use regex::bytes::Regex;
use tracing::debug;

use crate::PromptAnswer;

const READ_CHUNK: usize = 4096;

/// Reads a streaming command response, answering interactive prompts as they
/// appear. Each answer is written once per prompt occurrence; text already
/// answered is never rescanned, and zero-length matches are ignored. Reading
/// stops when `terminal` matches the unscanned tail, or at end of stream when
/// no terminal prompt is given.
pub fn converse<R, W>(
    reader: &mut R,
    writer: &mut W,
    prompts: &[PromptAnswer],
    terminal: Option<&Regex>,
) -> io::Result<String>
where
    R: Read,
    W: Write,
{
    let mut raw = Vec::new();
    let mut scanned = 0_usize;
    let mut chunk = [0_u8; READ_CHUNK];

    loop {
        let read = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        raw.extend_from_slice(&chunk[..read]);

        while let Some((prompt, end)) = next_prompt(prompts, &raw[scanned..]) {
            debug!(answer = %prompt.answer, "answering device prompt");
            writer.write_all(prompt.answer.as_bytes())?;
            writer.write_all(b"\n")?;
            writer.flush()?;
            scanned += end;
        }

        if terminal.is_some_and(|terminal| terminal.is_match(&raw[scanned..])) {
            break;
        }
    }

    Ok(String::from_utf8_lossy(&raw).into_owned())
}

fn next_prompt<'a>(prompts: &'a [PromptAnswer], window: &[u8]) -> Option<(&'a PromptAnswer, usize)> {
    prompts
        .iter()
        .filter_map(|prompt| {
            // An empty match would answer without consuming input.
            prompt
                .pattern
                .find_iter(window)
                .find(|found| found.end() > found.start())
                .map(|found| (prompt, found))
        })
        .min_by_key(|(_, found)| found.start())
        .map(|(prompt, found)| (prompt, found.end()))
}
