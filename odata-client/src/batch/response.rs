//! Decoding multipart batch responses
//!
//! Parts are matched to slots by position. A part that cannot be read yields
//! a [`BatchPartError`] for its slot only; the remaining parts still decode.

use super::{Batch, BatchItem, Changeset, PartResult, SlotResult};
use crate::error::{BatchPartError, Error, Result};
use crate::query::{ODataRequest, RequestContext, result};
use crate::transport::HttpResponse;

/// `boundary` parameter of a multipart content type
pub(crate) fn boundary_of(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("boundary")
            .then(|| value.trim().trim_matches('"').to_string())
    })
}

fn is_multipart(content_type: &str) -> bool {
    content_type
        .trim_start()
        .to_ascii_lowercase()
        .starts_with("multipart/mixed")
}

/// The line break before a delimiter belongs to the delimiter
fn strip_newline(text: &str) -> &str {
    text.strip_suffix("\r\n")
        .or_else(|| text.strip_suffix('\n'))
        .unwrap_or(text)
}

struct Split<'t> {
    parts: Vec<&'t str>,
    /// Content after the last delimiter when the closing delimiter is missing
    unterminated: Option<&'t str>,
}

fn split_parts<'t>(text: &'t str, boundary: &str) -> Split<'t> {
    let delimiter = format!("--{boundary}");
    let closing = format!("{delimiter}--");
    let mut parts = Vec::new();
    let mut start: Option<usize> = None;
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let content = line.trim_end();
        if content == delimiter || content == closing {
            if let Some(begin) = start.take() {
                parts.push(strip_newline(&text[begin..offset]));
            }
            if content == closing {
                return Split {
                    parts,
                    unterminated: None,
                };
            }
            start = Some(offset + line.len());
        }
        offset += line.len();
    }
    Split {
        parts,
        unterminated: start.map(|begin| &text[begin..]),
    }
}

fn raw_parts<'t>(text: &'t str, boundary: &str) -> Vec<std::result::Result<&'t str, BatchPartError>> {
    let split = split_parts(text, boundary);
    let mut parts: Vec<_> = split.parts.into_iter().map(Ok).collect();
    if split.unterminated.is_some() {
        parts.push(Err(BatchPartError::Truncated {
            index: parts.len(),
            detail: format!("closing delimiter --{boundary}-- is missing"),
        }));
    }
    parts
}

/// Header lines up to the first blank line, and what follows it.
/// `None` when the text stops in the middle of a header line.
fn split_head(text: &str) -> Option<(Vec<&str>, &str)> {
    let mut lines = Vec::new();
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        offset += line.len();
        let content = line.trim_end_matches(['\r', '\n']);
        if content.is_empty() {
            return Some((lines, &text[offset..]));
        }
        if !line.ends_with('\n') {
            return None;
        }
        lines.push(content);
    }
    Some((lines, ""))
}

fn parse_headers(
    lines: &[&str],
    index: usize,
) -> std::result::Result<Vec<(String, String)>, BatchPartError> {
    lines
        .iter()
        .map(|line| match line.split_once(':') {
            Some((name, value)) if !name.trim().is_empty() => {
                Ok((name.trim().to_string(), value.trim().to_string()))
            }
            _ => Err(BatchPartError::MalformedHeaders {
                index,
                detail: format!("'{line}' is not a header"),
            }),
        })
        .collect()
}

fn header<'h>(headers: &'h [(String, String)], name: &str) -> Option<&'h str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// A MIME part: its own headers and its content
struct Part<'t> {
    headers: Vec<(String, String)>,
    content: &'t str,
}

fn parse_part(text: &str, index: usize) -> std::result::Result<Part<'_>, BatchPartError> {
    let (head, content) = split_head(text).ok_or_else(|| BatchPartError::Truncated {
        index,
        detail: "part ends inside its headers".to_string(),
    })?;
    Ok(Part {
        headers: parse_headers(&head, index)?,
        content,
    })
}

fn parse_status(line: &str) -> Option<u16> {
    let mut words = line.split_whitespace();
    if !words.next()?.starts_with("HTTP/") {
        return None;
    }
    let code = words.next()?;
    if code.len() != 3 {
        return None;
    }
    code.parse().ok()
}

/// The embedded `application/http` response of a part
fn parse_http(text: &str, index: usize) -> std::result::Result<HttpResponse, BatchPartError> {
    let (head, body) = split_head(text).ok_or_else(|| BatchPartError::Truncated {
        index,
        detail: "response ends inside its headers".to_string(),
    })?;
    let Some((status_line, header_lines)) = head.split_first() else {
        return Err(BatchPartError::Truncated {
            index,
            detail: "response has no status line".to_string(),
        });
    };
    let status = parse_status(status_line).ok_or_else(|| BatchPartError::MalformedStatusLine {
        index,
        line: status_line.to_string(),
    })?;
    let headers = parse_headers(header_lines, index)?;

    let mut body = body.as_bytes();
    if let Some(declared) = header(&headers, "Content-Length") {
        let declared: usize = declared
            .parse()
            .map_err(|_| BatchPartError::MalformedHeaders {
                index,
                detail: format!("invalid Content-Length '{declared}'"),
            })?;
        // trailing line breaks before the next delimiter are not part of the body
        if declared > body.len() || body[declared..].iter().any(|b| !b.is_ascii_whitespace()) {
            return Err(BatchPartError::LengthMismatch {
                index,
                declared,
                actual: body.len(),
            });
        }
        body = &body[..declared];
    }

    Ok(HttpResponse {
        status,
        headers,
        body: body.to_vec(),
    })
}

/// Splits a batch response into per-slot results
pub struct BatchResponseParser<'a> {
    ctx: RequestContext<'a>,
}

impl<'a> BatchResponseParser<'a> {
    pub fn new(ctx: RequestContext<'a>) -> Self {
        Self { ctx }
    }

    /// One result per batch slot, in slot order. Fails as a whole only when
    /// the response is not a multipart document.
    pub fn parse(&self, batch: &Batch, response: &HttpResponse) -> Result<Vec<SlotResult>> {
        let content_type = response.header("Content-Type").unwrap_or_default();
        let boundary = boundary_of(content_type)
            .filter(|_| is_multipart(content_type))
            .ok_or_else(|| {
                Error::decode(format!(
                    "Batch response is not multipart content: '{content_type}'"
                ))
            })?;
        let text = response.text();
        let parts = raw_parts(&text, &boundary);
        if parts.len() > batch.len() {
            log::warn!(
                "Batch {} answered {} parts for {} slots, ignoring the surplus",
                batch.id(),
                parts.len(),
                batch.len()
            );
        }

        let results: Vec<SlotResult> = batch
            .items()
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let raw = parts
                    .get(index)
                    .cloned()
                    .unwrap_or(Err(BatchPartError::Missing { index }));
                match item {
                    BatchItem::Request(request) => {
                        SlotResult::Single(raw.and_then(|text| self.single(index, request, text)))
                    }
                    BatchItem::Changeset(changeset) => SlotResult::Changeset(
                        raw.and_then(|text| self.changeset(index, changeset, text)),
                    ),
                }
            })
            .collect();

        for result in &results {
            match result {
                SlotResult::Single(Err(error)) | SlotResult::Changeset(Err(error)) => {
                    log::warn!("Batch {}: {error}", batch.id());
                }
                SlotResult::Changeset(Ok(parts)) => {
                    for error in parts.iter().filter_map(|part| part.as_ref().err()) {
                        log::warn!("Batch {} changeset: {error}", batch.id());
                    }
                }
                SlotResult::Single(Ok(_)) => {}
            }
        }
        Ok(results)
    }

    fn decode(&self, index: usize, request: &ODataRequest, response: &HttpResponse) -> PartResult {
        if !request.accepts(response.status) {
            return Err(BatchPartError::Status {
                index,
                status: response.status,
                body: response.text().into_owned(),
            });
        }
        result::decode(&self.ctx, &request.expect, response).map_err(|error| {
            BatchPartError::Decode {
                index,
                detail: error.to_string(),
            }
        })
    }

    fn single(&self, index: usize, request: &ODataRequest, text: &str) -> PartResult {
        let part = parse_part(text, index)?;
        if header(&part.headers, "Content-Type").is_some_and(is_multipart) {
            return Err(BatchPartError::Unexpected {
                index,
                detail: "a single request was answered with multipart content".to_string(),
            });
        }
        let response = parse_http(part.content, index)?;
        self.decode(index, request, &response)
    }

    fn changeset(
        &self,
        index: usize,
        changeset: &Changeset,
        text: &str,
    ) -> std::result::Result<Vec<PartResult>, BatchPartError> {
        let part = parse_part(text, index)?;
        let content_type = header(&part.headers, "Content-Type").unwrap_or_default();

        if !is_multipart(content_type) {
            // the server rejected the changeset as a whole
            let response = parse_http(part.content, index)?;
            return Err(if response.is_success() {
                BatchPartError::Unexpected {
                    index,
                    detail: format!(
                        "changeset {} was answered by a single response",
                        changeset.id()
                    ),
                }
            } else {
                BatchPartError::Status {
                    index,
                    status: response.status,
                    body: response.text().into_owned(),
                }
            });
        }

        let boundary = boundary_of(content_type).ok_or_else(|| BatchPartError::MalformedHeaders {
            index,
            detail: format!("'{content_type}' has no boundary"),
        })?;
        let parts = raw_parts(part.content, &boundary);
        Ok(changeset
            .requests()
            .iter()
            .enumerate()
            .map(|(position, request)| {
                let raw = parts
                    .get(position)
                    .cloned()
                    .unwrap_or(Err(BatchPartError::Missing { index: position }));
                raw.and_then(|text| {
                    let part = parse_part(text, position)?;
                    let response = parse_http(part.content, position)?;
                    self.decode(position, request, &response)
                })
            })
            .collect())
    }
}
