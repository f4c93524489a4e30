/// Tamanho padrão de chunk (em palavras), igual ao limite de entrada do modelo
pub const DEFAULT_MAX_WORDS: usize = 512;

/// Divide texto em chunks consecutivos de até `max_words` palavras, sem overlap.
/// Cada chunk é reconstruído juntando as palavras com um único espaço.
/// Texto vazio (ou só whitespace) não gera chunks.
pub fn chunk_text(text: &str, max_words: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    words
        .chunks(max_words.max(1))
        .map(|group| group.join(" "))
        .collect()
}
