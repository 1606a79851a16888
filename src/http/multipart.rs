//! `multipart/form-data` body parsing: splits a fully-buffered body on its
//! boundary delimiter, routing fields without a filename into the post
//! parameter map and fields with one into a streamed [`UploadedFile`].

use crate::http::request::parse_header_options;
use crate::prelude::*;
use crate::wire::find_subsequence;

/// `(field_name, original_name, temp_path, mime_type, size_bytes)`. Owned by
/// the `Connection`; every temp file is unlinked on teardown.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field_name: String,
    pub original_name: String,
    pub temp_path: PathBuf,
    pub mime_type: String,
    pub size_bytes: u64,
}

pub fn parse_multipart(
    body: &[u8],
    boundary: &str,
    tmp_dir: &Path,
) -> Result<(HashMap<String, String>, Vec<UploadedFile>)> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();

    let mut post_params = HashMap::new();
    let mut files = Vec::new();

    let mut pos = match find_subsequence(body, delimiter, 0) {
        Some(p) => p + delimiter.len(),
        None => return Ok((post_params, files)),
    };

    loop {
        // end-of-stream marker is `--` immediately following the boundary
        if body.get(pos..pos + 2) == Some(b"--") {
            break;
        }
        let part_start = skip_line_ending(body, pos);

        let next_delim = match find_subsequence(body, delimiter, part_start) {
            Some(p) => p,
            None => break,
        };
        let mut part_end = next_delim;
        part_end = trim_trailing_line_ending(body, part_start, part_end);

        let part = &body[part_start..part_end];
        let Some(header_sep) = find_header_separator(part) else {
            pos = next_delim + delimiter.len();
            continue;
        };
        let headers_text = String::from_utf8_lossy(&part[..header_sep.0]);
        let data = &part[header_sep.1..];

        let mut field_name = String::new();
        let mut original_name: Option<String> = None;
        let mut mime_type = String::from("application/octet-stream");

        for line in headers_text.lines() {
            if let Some(rest) = line.strip_prefix("Content-Disposition:").or_else(|| line.strip_prefix("content-disposition:")) {
                let opts = parse_header_options(rest.trim());
                if let Some(name) = opts.get("name") {
                    field_name = name.clone();
                }
                if let Some(filename) = opts.get("filename") {
                    original_name = Some(filename.clone());
                }
            } else if let Some(rest) = line.strip_prefix("Content-Type:").or_else(|| line.strip_prefix("content-type:")) {
                mime_type = rest.trim().to_string();
            }
        }

        if let Some(original_name) = original_name {
            let temp_name = uuid::Uuid::new_v4().to_string();
            let temp_path = tmp_dir.join(temp_name);
            fs::write(&temp_path, data)?;
            files.push(UploadedFile {
                field_name,
                original_name,
                temp_path,
                mime_type,
                size_bytes: data.len() as u64,
            });
        } else {
            post_params.insert(field_name, String::from_utf8_lossy(data).into_owned());
        }

        pos = next_delim + delimiter.len();
    }

    Ok((post_params, files))
}

/// A boundary line is followed by either `\r\n` or a bare `\n`.
fn skip_line_ending(body: &[u8], pos: usize) -> usize {
    if body.get(pos..pos + 2) == Some(b"\r\n") {
        pos + 2
    } else if body.get(pos) == Some(&b'\n') {
        pos + 1
    } else {
        pos
    }
}

fn trim_trailing_line_ending(body: &[u8], start: usize, end: usize) -> usize {
    if end >= start + 2 && &body[end - 2..end] == b"\r\n" {
        end - 2
    } else if end >= start + 1 && body[end - 1] == b'\n' {
        end - 1
    } else {
        end
    }
}

/// Finds the header/body separator, tolerating `\r\n\r\n` or bare `\n\n`.
/// Returns `(header_len, data_start)`.
fn find_header_separator(part: &[u8]) -> Option<(usize, usize)> {
    if let Some(p) = find_subsequence(part, b"\r\n\r\n", 0) {
        return Some((p, p + 4));
    }
    find_subsequence(part, b"\n\n", 0).map(|p| (p, p + 2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_field_and_file_parts() {
        let body = concat!(
            "--B\r\n",
            "Content-Disposition: form-data; name=\"title\"\r\n\r\n",
            "hello\r\n",
            "--B\r\n",
            "Content-Disposition: form-data; name=\"f\"; filename=\"a.txt\"\r\n",
            "Content-Type: text/plain\r\n\r\n",
            "file contents\r\n",
            "--B--\r\n",
        );
        let dir = std::env::temp_dir();
        let (fields, files) = parse_multipart(body.as_bytes(), "B", &dir).unwrap();
        assert_eq!(fields.get("title").unwrap(), "hello");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].original_name, "a.txt");
        let saved = fs::read(&files[0].temp_path).unwrap();
        assert_eq!(saved, b"file contents");
        let _ = fs::remove_file(&files[0].temp_path);
    }

    #[test]
    fn tolerates_bare_newline_endings() {
        let body = concat!(
            "--B\n",
            "Content-Disposition: form-data; name=\"a\"\n\n",
            "v\n",
            "--B--\n",
        );
        let dir = std::env::temp_dir();
        let (fields, _) = parse_multipart(body.as_bytes(), "B", &dir).unwrap();
        assert_eq!(fields.get("a").unwrap(), "v");
    }
}
