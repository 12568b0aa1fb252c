use crate::catalog::Publication;

/// Derives document and thumbnail addresses from publication ids
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetLocator {
    pdf_base: String,
    thumbnail_base: String,
}

impl AssetLocator {
    pub fn new(pdf_base: impl Into<String>, thumbnail_base: impl Into<String>) -> Self {
        Self {
            pdf_base: pdf_base.into(),
            thumbnail_base: thumbnail_base.into(),
        }
    }

    /// `pdf_file` wins when present, otherwise `{pdf_base}/{id}.pdf`
    pub fn document(&self, publication: &Publication) -> String {
        match publication.pdf_file.as_deref().map(str::trim) {
            Some(file) if !file.is_empty() => file.to_string(),
            _ => join(&self.pdf_base, &format!("{}.pdf", publication.id)),
        }
    }

    pub fn thumbnail(&self, publication: &Publication) -> String {
        join(&self.thumbnail_base, &format!("{}.jpg", publication.id))
    }
}

fn join(base: &str, file: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.is_empty() {
        file.to_string()
    } else {
        format!("{base}/{file}")
    }
}
