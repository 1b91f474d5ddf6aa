/*!
 * Prompt templates and builders for the orchestration core.
 */

/// Build the prompt asking the model to shorten a subtitle line
///
/// The response is expected as a JSON object carrying a `result` field with
/// the shortened subtitle.
pub fn subtitle_trim_prompt(text: &str, duration: f64) -> String {
    format!(
        "## Role\n\
         You are a professional subtitle editor.\n\n\
         ## Task\n\
         The subtitle below takes too long to read aloud. Shorten it so it can be \
         read comfortably within {duration:.1} seconds. Remove filler words and \
         redundant phrasing first; only then condense wording. Keep the original \
         language, meaning and tone. Do not add anything.\n\n\
         ## Subtitle\n\
         {text}\n\n\
         ## Output\n\
         Return a JSON object in this exact format:\n\
         {{\n\
             \"analysis\": \"one short note on what was removed\",\n\
             \"result\": \"the shortened subtitle\"\n\
         }}"
    )
}
