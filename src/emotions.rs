/// Conjunto fechado de emoções reconhecidas pelo classificador
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Emotion {
    Anger,
    Disgust,
    Fear,
    Joy,
    Neutral,
    Sadness,
    Surprise,
}

impl Emotion {
    /// Ordem da tabela de tradução (também a ordem das chaves na resposta)
    pub const ALL: [Emotion; 7] = [
        Emotion::Anger,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Joy,
        Emotion::Neutral,
        Emotion::Sadness,
        Emotion::Surprise,
    ];

    /// Label em inglês, como o modelo devolve
    pub fn model_label(self) -> &'static str {
        match self {
            Emotion::Anger => "anger",
            Emotion::Disgust => "disgust",
            Emotion::Fear => "fear",
            Emotion::Joy => "joy",
            Emotion::Neutral => "neutral",
            Emotion::Sadness => "sadness",
            Emotion::Surprise => "surprise",
        }
    }

    /// Label traduzido para exibição
    pub fn display_label(self) -> &'static str {
        match self {
            Emotion::Anger => "raiva",
            Emotion::Disgust => "desgosto",
            Emotion::Fear => "medo",
            Emotion::Joy => "alegria",
            Emotion::Neutral => "neutro",
            Emotion::Sadness => "tristeza",
            Emotion::Surprise => "surpresa",
        }
    }

    /// Resolve um label do modelo. Ignora caixa e espaços nas pontas.
    pub fn from_model_label(label: &str) -> Option<Emotion> {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|e| e.model_label().eq_ignore_ascii_case(label))
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translation_table() {
        let pairs: Vec<(&str, &str)> = Emotion::ALL
            .iter()
            .map(|e| (e.model_label(), e.display_label()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("anger", "raiva"),
                ("disgust", "desgosto"),
                ("fear", "medo"),
                ("joy", "alegria"),
                ("neutral", "neutro"),
                ("sadness", "tristeza"),
                ("surprise", "surpresa"),
            ]
        );
    }

    #[test]
    fn test_from_model_label() {
        assert_eq!(Emotion::from_model_label("joy"), Some(Emotion::Joy));
        assert_eq!(Emotion::from_model_label(" Sadness "), Some(Emotion::Sadness));
        assert_eq!(Emotion::from_model_label("alegria"), None);
        assert_eq!(Emotion::from_model_label("love"), None);
    }

    #[test]
    fn test_index_matches_table_order() {
        for (i, e) in Emotion::ALL.iter().enumerate() {
            assert_eq!(e.index(), i);
        }
    }
}
