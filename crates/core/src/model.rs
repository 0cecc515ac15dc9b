//! The external layout model, seen as an injected capability.
//!
//! Callers construct a [`TokenSource`] once and hand it to every pipeline
//! function that needs inference. Tests pass in-memory doubles.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::DynamicImage;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::token::Token;

/// A page image with the name it is known by in the dataset.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// Image file name, e.g. `laporan-hal-1.png`.
    pub name: String,
    pub image: DynamicImage,
}

impl PageImage {
    pub fn new(name: impl Into<String>, image: DynamicImage) -> Self {
        Self {
            name: name.into(),
            image,
        }
    }

    /// File name without its extension.
    pub fn stem(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.name)
    }
}

/// Produces the token stream of a page.
///
/// Implementations may include special tokens; the pipeline removes them.
pub trait TokenSource: Sync {
    fn extract_tokens(&self, page: &PageImage) -> Result<Vec<Token>>;
}

/// Token dumps written by the extractor: either a bare list or wrapped in
/// the extractor's result object.
#[derive(Deserialize)]
#[serde(untagged)]
enum TokenDump {
    List(Vec<Token>),
    Wrapped {
        hasil_analisis_kontekstual: Vec<Token>,
    },
}

impl TokenDump {
    fn into_tokens(self) -> Vec<Token> {
        match self {
            TokenDump::List(tokens) => tokens,
            TokenDump::Wrapped {
                hasil_analisis_kontekstual,
            } => hasil_analisis_kontekstual,
        }
    }
}

/// Parse a token dump document.
pub fn parse_token_dump(json: &str) -> Result<Vec<Token>> {
    let dump: TokenDump = serde_json::from_str(json)?;
    Ok(dump.into_tokens())
}

/// Read a token dump file.
pub fn load_token_dump(path: &Path) -> Result<Vec<Token>> {
    let json = std::fs::read_to_string(path)?;
    parse_token_dump(&json)
}

/// Reads pre-computed model output: `<dir>/<image stem>.json` per page.
#[derive(Debug, Clone)]
pub struct TokenDumpSource {
    dir: PathBuf,
}

impl TokenDumpSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dump_path(&self, page: &PageImage) -> PathBuf {
        self.dir.join(format!("{}.json", page.stem()))
    }
}

impl TokenSource for TokenDumpSource {
    fn extract_tokens(&self, page: &PageImage) -> Result<Vec<Token>> {
        let path = self.dump_path(page);
        load_token_dump(&path).map_err(|e| Error::TokenSource {
            page: page.name.clone(),
            reason: format!("{}: {e}", path.display()),
        })
    }
}

/// Fixed token streams keyed by page name.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenSource {
    pages: HashMap<String, Vec<Token>>,
}

impl StaticTokenSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, name: impl Into<String>, tokens: Vec<Token>) -> Self {
        self.pages.insert(name.into(), tokens);
        self
    }
}

impl TokenSource for StaticTokenSource {
    fn extract_tokens(&self, page: &PageImage) -> Result<Vec<Token>> {
        self.pages
            .get(&page.name)
            .cloned()
            .ok_or_else(|| Error::TokenSource {
                page: page.name.clone(),
                reason: "no tokens registered".into(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn page(name: &str) -> PageImage {
        PageImage::new(name, DynamicImage::ImageRgb8(RgbImage::new(4, 4)))
    }

    #[test]
    fn test_parse_bare_and_wrapped_dumps() {
        let bare = r#"[{"token": "Ġa", "box": [1, 2, 3, 4]}]"#;
        assert_eq!(parse_token_dump(bare).unwrap().len(), 1);

        let wrapped = r#"{"hasil_analisis_kontekstual": [
            {"token": "Ġa", "label": "O", "box": [1, 2, 3, 4]},
            {"token": "b", "label": "O", "box": [3, 2, 5, 4]}
        ]}"#;
        let tokens = parse_token_dump(wrapped).unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[1].text, "b");
    }

    #[test]
    fn test_stem() {
        assert_eq!(page("laporan-hal-1.png").stem(), "laporan-hal-1");
        assert_eq!(page("noext").stem(), "noext");
    }

    #[test]
    fn test_dump_source_missing_file() {
        let source = TokenDumpSource::new("/nonexistent");
        assert!(matches!(
            source.extract_tokens(&page("a.png")),
            Err(Error::TokenSource { .. })
        ));
    }

    #[test]
    fn test_static_source() {
        let source = StaticTokenSource::new().with_page("a.png", vec![Token::new("x", [0.0; 4])]);
        assert_eq!(source.extract_tokens(&page("a.png")).unwrap().len(), 1);
        assert!(source.extract_tokens(&page("b.png")).is_err());
    }
}
