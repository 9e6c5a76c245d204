//! Prompt construction for the three interaction tasks.
//!
//! Pure string building. Callers reject empty input before getting here.

use reflectify_core::{Mood, ScoreCategory, Turn};

/// Welcome turn that opens a conversation for `mood`.
pub fn welcome_message(mood: Mood) -> &'static str {
    match mood {
        Mood::Happy => {
            "It's wonderful to hear you're feeling good today! What's contributing to your \
             happiness? Let's explore those positive feelings together."
        }
        Mood::Neutral => {
            "You're feeling balanced today. That's a good state to be in. Would you like to \
             talk about maintaining this equilibrium or anything else on your mind?"
        }
        Mood::Sad => {
            "I'm sorry to hear you're feeling down. It takes courage to acknowledge these \
             feelings. Would you like to talk about what's on your mind, or perhaps I could \
             share some encouraging thoughts?"
        }
        Mood::Unset => "Hello! How are you feeling today?",
    }
}

/// Tone instruction embedded in chat prompts.
pub fn tone_directive(mood: Mood) -> &'static str {
    match mood {
        Mood::Happy => "Celebrate with them and help them savor the positive emotions.",
        Mood::Neutral => "Provide balanced perspective and gentle guidance.",
        Mood::Sad => "Show compassion, validation, and gentle suggestions for feeling better.",
        Mood::Unset => "Be warm and supportive, and gently invite them to share how they feel.",
    }
}

/// Prompt for a one-off expression.
pub fn build_expression_prompt(text: &str) -> String {
    format!(
        "The user is sharing their feelings with you. They said: \"{text}\"\n\n\
         Provide a supportive, empathetic, and helpful response focused on emotional \
         wellbeing. Be compassionate but not clinical. Aim for about 3-4 sentences that \
         acknowledge their feelings, offer perspective, and provide a gentle suggestion if \
         appropriate. Do not use obvious templates or introduce yourself. Just respond \
         naturally as a caring friend would."
    )
}

/// Prompt for the next chat turn.
///
/// `history` is every prior turn in order; `new_text` is the message being
/// submitted and must not already be part of `history`.
pub fn build_chat_prompt(mood: Mood, history: &[Turn], new_text: &str) -> String {
    let transcript = history
        .iter()
        .map(Turn::prompt_line)
        .collect::<Vec<_>>()
        .join("\n");

    let feeling = if mood.is_set() {
        format!("is currently feeling {}", mood)
    } else {
        "has not said how they feel yet".to_string()
    };

    format!(
        "You are an AI wellbeing assistant having a conversation with a user who \
         {feeling}.\n\n\
         Previous conversation:\n{transcript}\n\n\
         User's new message: \"{new_text}\"\n\n\
         Tone: {tone}\n\n\
         Keep your response conversational, helpful, and focused on wellbeing. Don't use \
         obvious templates or introduce yourself - this is an ongoing conversation.",
        tone = tone_directive(mood),
    )
}

/// Prompt asking for a single JSON safety analysis of `text`.
pub fn build_analysis_prompt(text: &str) -> String {
    let fields = ScoreCategory::ALL
        .iter()
        .map(|c| format!("  \"{}\": <number between 0 and 1>,", c.field_name()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Analyze the following social media post for harmful content. Score each category \
         from 0 (absent) to 1 (severe): toxicity, insult, profanity, identity_attack and \
         threat. Classify the post overall as exactly one of \"safe\", \"caution\" or \
         \"toxic\", and write a brief summary of your assessment.\n\n\
         Respond with a single valid JSON object and nothing else, in this format:\n\
         {{\n{fields}\n  \"overall\": \"safe\" | \"caution\" | \"toxic\",\n  \
         \"summary\": \"<brief summary>\"\n}}\n\n\
         Post to analyze: \"{text}\""
    )
}
