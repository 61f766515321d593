//! Prompt templates for the word-of-the-day requests.

/// Build the system instruction for a user's word request.
///
/// The reply format is fixed so responses look uniform in chat. When the
/// requested language is English there is nothing to translate, so the
/// translation line is left out. This is a pure template decision on the
/// literal language string, not language detection.
pub fn word_request(language: &str, word_length: u64) -> String {
    let mut prompt = format!(
        "You are a helpful language teacher. Provide one random {language} word \
         that is exactly {word_length} letters long. Respond using exactly this format:\n\
         Word: <the word>\n\
         Language: {language}\n\
         Meaning: <a short definition>\n\
         Pronunciation: <how to pronounce it>\n\
         Additional Information: <an example sentence or usage note>"
    );

    if language != "English" {
        prompt.push_str(&format!(
            "\nTranslation into English: <the {language} word translated into English>"
        ));
    }

    prompt
}

/// System-only prompt used by the idle nudge. No user content is attached.
pub fn idle_nudge() -> String {
    "You are a helpful language teacher. Provide one random word from any \
     language you like, with a short description of what it means and which \
     language it comes from."
        .to_string()
}
