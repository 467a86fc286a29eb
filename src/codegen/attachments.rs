//! Inlining uploaded files into the generation prompt.

/// Bytes inspected when deciding whether a file is binary.
const BINARY_SNIFF_BYTES: usize = 8000;
/// Fraction of control bytes above which a file is treated as binary.
const CONTROL_BYTE_RATIO: f64 = 0.3;
/// Longest text inlined per file, in characters.
const MAX_INLINE_CHARS: usize = 5_000_000;

const TRUNCATION_MARKER: &str = "\n... (content truncated due to size)";

/// A file uploaded alongside a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedFile {
    pub name: String,
    pub content: Vec<u8>,
}

impl AttachedFile {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

enum Rendered {
    Text(String),
    Binary,
    InvalidUtf8,
}

/// A NUL byte, or too many control bytes other than tab/LF/CR, in the first
/// 8000 bytes.
pub fn is_binary(content: &[u8]) -> bool {
    let sample = &content[..content.len().min(BINARY_SNIFF_BYTES)];
    if sample.is_empty() {
        return false;
    }
    if sample.contains(&0) {
        return true;
    }
    let control = sample
        .iter()
        .filter(|&&b| b < 32 && b != b'\t' && b != b'\n' && b != b'\r')
        .count();
    control as f64 / sample.len() as f64 > CONTROL_BYTE_RATIO
}

/// Strict UTF-8 decode. A replacement character in the input counts as
/// invalid too, since it usually means the upload was already mangled.
fn decode_strict(content: &[u8]) -> Option<&str> {
    let text = std::str::from_utf8(content).ok()?;
    if text.contains(char::REPLACEMENT_CHARACTER) {
        return None;
    }
    Some(text)
}

fn render(file: &AttachedFile) -> Rendered {
    if is_binary(&file.content) {
        return Rendered::Binary;
    }
    let Some(text) = decode_strict(&file.content) else {
        return Rendered::InvalidUtf8;
    };
    match text.char_indices().nth(MAX_INLINE_CHARS) {
        Some((cut, _)) => Rendered::Text(format!("{}{TRUNCATION_MARKER}", &text[..cut])),
        None => Rendered::Text(text.to_string()),
    }
}

/// Append the uploaded files to the prompt. Text files are inlined in fenced
/// blocks, everything else is listed by name.
pub fn enhance_prompt(prompt: &str, files: &[AttachedFile]) -> String {
    if files.is_empty() {
        return prompt.to_string();
    }

    let mut out = format!("{prompt}\n\n--- UPLOADED FILES ---\n");
    for file in files {
        match render(file) {
            Rendered::Text(content) => {
                out.push_str(&format!("\n**File: {}**\n```\n{content}\n```\n", file.name));
            }
            Rendered::Binary => {
                tracing::debug!(file = %file.name, "Skipping binary upload");
                out.push_str(&format!(
                    "\n**File: {}** (binary file - content not included)\n",
                    file.name
                ));
            }
            Rendered::InvalidUtf8 => {
                tracing::warn!(file = %file.name, "Upload is not valid UTF-8");
                out.push_str(&format!(
                    "\n**File: {}** (invalid UTF-8 encoding - content not included)\n",
                    file.name
                ));
            }
        }
    }
    out.push_str(
        "\n--- END OF UPLOADED FILES ---\n\n\
         Please consider the above files when implementing the requested changes.",
    );
    out
}
