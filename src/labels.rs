//! The fixed, ordered label table.
//!
//! Order is significant: index `i` of the model's logit vector scores
//! `DocumentLabel::ALL[i]`. Reordering the variants silently changes every
//! prediction, so the table is checked against the model output width at
//! startup.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A document-type category the classifier can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentLabel {
    AtaDeReuniao,
    PropostaComercial,
    ComprovanteDePagamento,
    Contrato,
    Manual,
    AtestadoDeSaudeOcupacional,
    OrdemDeCompra,
    FichaCadastral,
    Aceite,
    NotaDeEmpenho,
    CertidaoNegativa,
    /// Catch-all for empty content and out-of-range predictions.
    Unknown,
}

impl DocumentLabel {
    /// Every label, positionally aligned with the model's output indices.
    pub const ALL: [DocumentLabel; 12] = [
        DocumentLabel::AtaDeReuniao,
        DocumentLabel::PropostaComercial,
        DocumentLabel::ComprovanteDePagamento,
        DocumentLabel::Contrato,
        DocumentLabel::Manual,
        DocumentLabel::AtestadoDeSaudeOcupacional,
        DocumentLabel::OrdemDeCompra,
        DocumentLabel::FichaCadastral,
        DocumentLabel::Aceite,
        DocumentLabel::NotaDeEmpenho,
        DocumentLabel::CertidaoNegativa,
        DocumentLabel::Unknown,
    ];

    /// Number of labels; the model must emit exactly this many logits.
    pub const COUNT: usize = Self::ALL.len();

    /// Label at model output index `idx`, if in range.
    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }

    /// Label at `idx`, or [`DocumentLabel::Unknown`] when out of range.
    pub fn from_index_or_unknown(idx: usize) -> Self {
        Self::from_index(idx).unwrap_or(DocumentLabel::Unknown)
    }

    /// Position of this label in the table.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Stable identifier, e.g. `ATA_DE_REUNIAO`.
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentLabel::AtaDeReuniao => "ATA_DE_REUNIAO",
            DocumentLabel::PropostaComercial => "PROPOSTA_COMERCIAL",
            DocumentLabel::ComprovanteDePagamento => "COMPROVANTE_DE_PAGAMENTO",
            DocumentLabel::Contrato => "CONTRATO",
            DocumentLabel::Manual => "MANUAL",
            DocumentLabel::AtestadoDeSaudeOcupacional => "ATESTADO_DE_SAUDE_OCUPACIONAL",
            DocumentLabel::OrdemDeCompra => "ORDEM_DE_COMPRA",
            DocumentLabel::FichaCadastral => "FICHA_CADASTRAL",
            DocumentLabel::Aceite => "ACEITE",
            DocumentLabel::NotaDeEmpenho => "NOTA_DE_EMPENHO",
            DocumentLabel::CertidaoNegativa => "CERTIDAO_NEGATIVA",
            DocumentLabel::Unknown => "UNKNOWN",
        }
    }

    /// Human-readable form with spaces, as used in the training labels.
    pub fn display_name(self) -> String {
        self.as_str().replace('_', " ")
    }
}

impl fmt::Display for DocumentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no known label.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown document label '{0}'")]
pub struct ParseLabelError(pub String);

impl FromStr for DocumentLabel {
    type Err = ParseLabelError;

    /// Accepts the identifier (`NOTA_DE_EMPENHO`) or the display form
    /// (`nota de empenho`), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_uppercase().replace(' ', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|l| l.as_str() == key)
            .ok_or_else(|| ParseLabelError(s.to_string()))
    }
}
