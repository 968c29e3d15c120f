use super::ComposeResult;

/// Text-extent capability backing the overlay layout.
pub trait TextMeasurer {
    /// `(width, height)` of `line` in pixels. Height runs from the font's
    /// ascender line, where the line is drawn, down to the lowest ink.
    fn measure(&self, line: &str) -> ComposeResult<(u32, u32)>;

    fn ascent(&self) -> u32;

    fn descent(&self) -> u32;
}

/// Greedy word wrap bounded by `wrap_width` characters. Words are never
/// split; whitespace-only input yields no lines.
pub fn wrap_text(text: &str, wrap_width: usize) -> Vec<String> {
    let wrap_width = wrap_width.max(1);
    let mut result = Vec::new();
    let mut current = String::new();
    let mut units = 0usize;

    for word in text.split_whitespace() {
        let word_units = word.chars().count();
        if !current.is_empty() && units + 1 + word_units > wrap_width {
            result.push(std::mem::take(&mut current));
            units = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            units += 1;
        }
        current.push_str(word);
        units += word_units;
    }

    if !current.is_empty() {
        result.push(current);
    }
    result
}

pub fn measure_line(measurer: &dyn TextMeasurer, line: &str) -> ComposeResult<(u32, u32)> {
    if line.is_empty() {
        return Ok((0, 0));
    }
    measurer.measure(line)
}
