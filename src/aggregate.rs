use anyhow::{Context, Result};
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::{debug, info, warn};

use crate::chunking::chunk_text;
use crate::classifier::{EmotionClassifier, LabelScore};
use crate::emotions::Emotion;

/// Soma das pontuações por emoção, acumulada em todos os chunks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmotionTotals {
    per_emotion: [f64; 7],
    grand_total: f64,
    chunks: usize,
}

impl EmotionTotals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acumula as pontuações de um chunk.
    /// Labels fora da tabela não entram nem no total da emoção nem no total geral.
    pub fn add_chunk(&mut self, scores: &[LabelScore]) {
        for item in scores {
            match Emotion::from_model_label(&item.label) {
                Some(emotion) => {
                    let score = item.score as f64;
                    self.per_emotion[emotion.index()] += score;
                    self.grand_total += score;
                }
                None => warn!("Label desconhecido ignorado: {:?} ({})", item.label, item.score),
            }
        }
        self.chunks += 1;
    }

    pub fn total(&self, emotion: Emotion) -> f64 {
        self.per_emotion[emotion.index()]
    }

    pub fn grand_total(&self) -> f64 {
        self.grand_total
    }

    pub fn chunks(&self) -> usize {
        self.chunks
    }

    /// Normaliza pelo total geral. Total zero (ou não finito) vira "0%" em todas as emoções.
    pub fn into_report(self) -> EmotionReport {
        let valid = self.grand_total > 0.0 && self.grand_total.is_finite();
        let percentages = Emotion::ALL.map(|emotion| {
            if valid {
                format_percentage(self.total(emotion) / self.grand_total * 100.0)
            } else {
                "0%".to_string()
            }
        });
        EmotionReport { percentages }
    }
}

pub fn format_percentage(value: f64) -> String {
    format!("{:.2}%", value)
}

/// Percentual por emoção, serializado como objeto JSON na ordem da tabela
#[derive(Debug, Clone, PartialEq)]
pub struct EmotionReport {
    percentages: [String; 7],
}

impl EmotionReport {
    pub fn get(&self, emotion: Emotion) -> &str {
        &self.percentages[emotion.index()]
    }

    /// Pares (label traduzido, percentual)
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        Emotion::ALL
            .iter()
            .map(move |&e| (e.display_label(), self.get(e)))
    }
}

impl Serialize for EmotionReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Emotion::ALL.len()))?;
        for (label, value) in self.iter() {
            map.serialize_entry(label, value)?;
        }
        map.end()
    }
}

/// Classifica cada chunk em ordem e agrega. Qualquer falha do classificador aborta tudo.
pub fn aggregate<S: AsRef<str>>(chunks: &[S], classifier: &dyn EmotionClassifier) -> Result<EmotionReport> {
    let mut totals = EmotionTotals::new();
    for (idx, chunk) in chunks.iter().enumerate() {
        let scores = classifier
            .classify(chunk.as_ref())
            .with_context(|| format!("falha ao classificar chunk {}", idx))?;
        debug!("Chunk {}: {:?}", idx, scores);
        totals.add_chunk(&scores);
    }
    Ok(totals.into_report())
}

/// Divide o texto em chunks e agrega as emoções de todos eles
pub fn analyze(text: &str, max_words: usize, classifier: &dyn EmotionClassifier) -> Result<EmotionReport> {
    let chunks = chunk_text(text, max_words);
    info!(
        "Analisando texto: {} palavras em {} chunk(s)",
        chunks.iter().map(|c| c.split_whitespace().count()).sum::<usize>(),
        chunks.len()
    );
    aggregate(&chunks, classifier)
}
