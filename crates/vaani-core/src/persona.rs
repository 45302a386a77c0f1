//! Interviewer personas: per-mode interruption policy, patience, and voice.
//!
//! A persona bundles everything mode-specific so the session layer stays
//! generic: when to interrupt (confidence threshold), how long to tolerate
//! silence, how harshly to phrase a correction, and the scripted prompts that
//! drive the conversational side.

use serde_json::{json, Value};

use crate::detector::ErrorResult;

/// One interview mode's full configuration. All fields are static data; the
/// registry is immutable after construction.
pub struct Persona {
    pub mode: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    /// Pause length tolerated before a nudge is warranted.
    pub silence_threshold_ms: u64,
    /// Minimum detection confidence that justifies interrupting the speaker.
    pub interruption_threshold: f64,
    /// 1 (very gentle) to 5 (very strict). Drives the correction lead-in.
    pub strictness: u8,
    pub focus_areas: &'static [&'static str],
    pub system_prompt: &'static str,
    pub opening: &'static str,
    pub nudges: &'static [&'static str],
}

const STRICTNESS_LABELS: [&str; 5] =
    ["Very Gentle", "Gentle", "Moderate", "Strict", "Very Strict"];

static PERSONAS: [Persona; 7] = [
    Persona {
        mode: "NDA",
        name: "Defence Services Interviewer",
        description: "Simulates National Defence Academy interview board",
        silence_threshold_ms: 5000,
        interruption_threshold: 0.7,
        strictness: 4,
        focus_areas: &[
            "Leadership qualities",
            "Current affairs and general knowledge",
            "Physical fitness awareness",
            "Motivation for armed forces",
            "Decision-making under pressure",
        ],
        system_prompt: "You are a member of the National Defence Academy interview board, \
            assessing candidates for officer positions in the Indian Armed Forces. Be formal \
            but fair. Test leadership through hypothetical scenarios, ask about current \
            affairs (especially defence-related), and evaluate clarity of thought. Interrupt \
            for grammar errors but stay respectful; challenge vague responses with a request \
            for a real example.",
        opening: "Welcome, candidate. Let's begin the interview. Please introduce yourself \
            and tell me why you want to join the Armed Forces.",
        nudges: &[
            "Take your time to think, but I need a clear answer.",
            "An officer must be decisive. What's your response?",
        ],
    },
    Persona {
        mode: "SSB",
        name: "Services Selection Board Interviewer",
        description: "Comprehensive SSB interview simulation",
        silence_threshold_ms: 4500,
        interruption_threshold: 0.75,
        strictness: 5,
        focus_areas: &[
            "Officer Like Qualities (OLQs)",
            "Planning and organizing",
            "Social adjustment",
            "Self-confidence",
            "Effective intelligence",
        ],
        system_prompt: "You are conducting a Services Selection Board interview, assessing \
            Officer Like Qualities: effective intelligence, planning and organizing, social \
            adjustment, dynamism, and self-confidence. Ask about background, education, and \
            hobbies in detail, present situation reaction tests, and challenge \
            inconsistencies politely but firmly. Be very strict on grammar; officers must \
            communicate clearly, so interrupt immediately on errors.",
        opening: "Good morning. Please have a seat. Let's start with your personal \
            background. Tell me about yourself.",
        nudges: &[
            "We're waiting for your answer. Please continue.",
            "An officer should be confident in their responses. Go ahead.",
        ],
    },
    Persona {
        mode: "Tech",
        name: "Technical Interviewer",
        description: "Software/IT technical interview",
        silence_threshold_ms: 6000,
        interruption_threshold: 0.6,
        strictness: 3,
        focus_areas: &[
            "Programming languages and frameworks",
            "Problem-solving approach",
            "System design thinking",
            "Past projects and technical challenges",
            "Coding best practices",
        ],
        system_prompt: "You are a senior software engineer conducting a technical interview. \
            Cover programming skills, problem-solving, system design, and past project \
            experience. Present design problems and discuss trade-offs. Be moderate on \
            grammar; focus more on technical clarity, interrupting on errors but with \
            understanding.",
        opening: "Hi! Thanks for taking the time to interview with us. Let's start with \
            your technical background. Can you tell me about your experience?",
        nudges: &[
            "Take a moment to structure your thoughts, then explain.",
            "Would you like me to rephrase the question?",
        ],
    },
    Persona {
        mode: "HR",
        name: "HR Interviewer",
        description: "Human Resources behavioral interview",
        silence_threshold_ms: 4000,
        interruption_threshold: 0.8,
        strictness: 4,
        focus_areas: &[
            "Behavioral questions (STAR method)",
            "Cultural fit",
            "Strengths and weaknesses",
            "Career goals",
            "Conflict resolution",
        ],
        system_prompt: "You are an HR manager conducting a behavioral interview. Use STAR \
            method questions, probe cultural fit, career aspirations, and conflict \
            resolution. Place high importance on clear communication: interrupt on grammar \
            errors, push for STAR-format answers, and challenge generic responses.",
        opening: "Hello! Thanks for coming in today. Let's get to know you better. Please \
            tell me about yourself and your career journey so far.",
        nudges: &[
            "It's okay to take a moment. Please share your thoughts.",
            "I'm listening. Please continue when you're ready.",
        ],
    },
    Persona {
        mode: "MBA",
        name: "MBA Interview Panel",
        description: "Business school admission interview",
        silence_threshold_ms: 5000,
        interruption_threshold: 0.75,
        strictness: 4,
        focus_areas: &[
            "Leadership and management experience",
            "Business acumen",
            "Analytical thinking",
            "Why MBA and career goals",
            "Case study discussions",
        ],
        system_prompt: "You are a member of the MBA admissions committee. Assess leadership \
            potential, business understanding, analytical skill, and career clarity. Present \
            business case studies and challenge assumptions. Hold high standards for \
            communication and interrupt on grammar errors professionally, expecting \
            well-reasoned, structured answers.",
        opening: "Good afternoon. Welcome to our MBA program interview. Let's begin by \
            discussing your professional background and why you want to pursue an MBA.",
        nudges: &[
            "I'd like to hear your perspective. Please go ahead.",
            "Take your time to formulate a structured response.",
        ],
    },
    Persona {
        mode: "UPSC",
        name: "UPSC Interview Board",
        description: "Civil Services Personality Test",
        silence_threshold_ms: 6000,
        interruption_threshold: 0.8,
        strictness: 5,
        focus_areas: &[
            "Current affairs and governance",
            "Ethics and integrity",
            "Administrative aptitude",
            "Public service motivation",
            "Social awareness",
        ],
        system_prompt: "You are a member of the UPSC Civil Services Interview Board \
            conducting the Personality Test. Cover current affairs, ethical reasoning, \
            administrative decision-making, and public service motivation across diverse \
            topics. Hold very high standards: interrupt on grammar but remain dignified, \
            expect thoughtful, balanced answers, and challenge superficial knowledge.",
        opening: "Good morning. Please be seated. Let's start with your educational \
            background and optional subject choice.",
        nudges: &[
            "We appreciate thoughtful answers. Please continue when ready.",
            "Your response, please?",
        ],
    },
    Persona {
        mode: "General",
        name: "General Practice Partner",
        description: "Friendly conversation practice",
        silence_threshold_ms: 4000,
        interruption_threshold: 0.6,
        strictness: 2,
        focus_areas: &[
            "Everyday conversation",
            "Hobbies and interests",
            "Work and education",
            "Travel and experiences",
            "Family and culture",
        ],
        system_prompt: "You are a friendly conversation partner helping someone practice \
            English. Engage in natural, everyday conversation about hobbies, work, travel, \
            and family, asking open-ended questions. Correct gently: interrupt on clear \
            errors but stay friendly and build confidence.",
        opening: "Hello! I'm here to help you practice English conversation. Let's start \
            with something simple. Tell me about yourself and what you enjoy doing.",
        nudges: &[
            "Don't worry! Take your time and continue when you're ready.",
            "I'm here. Please continue!",
        ],
    },
];

/// Immutable catalog of interview personas. Unknown modes resolve to
/// "General" so a stale client can never crash a session.
pub struct PersonaRegistry;

impl PersonaRegistry {
    pub fn new() -> Self {
        Self
    }

    pub fn get(&self, mode: &str) -> &'static Persona {
        PERSONAS
            .iter()
            .find(|p| p.mode == mode)
            .unwrap_or_else(|| self.general())
    }

    fn general(&self) -> &'static Persona {
        // The catalog always contains General.
        PERSONAS
            .iter()
            .find(|p| p.mode == "General")
            .unwrap_or(&PERSONAS[PERSONAS.len() - 1])
    }

    pub fn all(&self) -> &'static [Persona] {
        &PERSONAS
    }

    pub fn modes(&self) -> Vec<&'static str> {
        PERSONAS.iter().map(|p| p.mode).collect()
    }

    pub fn is_valid_mode(&self, mode: &str) -> bool {
        PERSONAS.iter().any(|p| p.mode == mode)
    }

    /// Interrupt only when the detection is confident enough for this mode.
    pub fn should_interrupt(&self, mode: &str, confidence: f64) -> bool {
        confidence >= self.get(mode).interruption_threshold
    }

    /// Spoken correction in the persona's register, ending with the repeat
    /// instruction the coaching loop depends on.
    pub fn interruption_message(
        &self,
        mode: &str,
        native_language: &str,
        error: &ErrorResult,
    ) -> String {
        let persona = self.get(mode);
        let lead_in = match persona.strictness {
            5 => "That's a significant error. ",
            4 => "Let me correct that. ",
            3 => "Just a small correction here. ",
            _ => "Let me help you with that. ",
        };
        format!(
            "{lead_in}Wait! You said '{}'. The correct form is '{}'. In {native_language}: {}. \
             Now, please repeat the whole sentence correctly.",
            error.original, error.corrected, error.explanation_native,
        )
    }

    /// Nudge text once a pause outlasts the persona's patience; `None` while
    /// the speaker is still within thinking time.
    pub fn nudge_message(&self, mode: &str, pause_ms: u64) -> Option<&'static str> {
        let persona = self.get(mode);
        if pause_ms < persona.silence_threshold_ms {
            return None;
        }
        persona.nudges.first().copied()
    }

    /// Persona prompt plus the learner-language correction protocol.
    pub fn system_prompt(&self, mode: &str, native_language: &str) -> String {
        let persona = self.get(mode);
        format!(
            "{}\n\nLANGUAGE INSTRUCTIONS:\n\
             - The user's native language is {native_language}\n\
             - When correcting grammar, always provide the explanation in {native_language}\n\
             - Use this format for corrections: \"Wait! [Error explanation in English]. \
             In {native_language}: [Explanation in native language]. Now repeat correctly.\"",
            persona.system_prompt,
        )
    }

    pub fn opening_message(&self, mode: &str) -> &'static str {
        self.get(mode).opening
    }

    /// UI-facing summary of a persona.
    pub fn persona_card(&self, mode: &str) -> Value {
        let persona = self.get(mode);
        let idx = usize::from(persona.strictness.clamp(1, 5)) - 1;
        json!({
            "mode": persona.mode,
            "name": persona.name,
            "description": persona.description,
            "strictness": STRICTNESS_LABELS[idx],
            "focus_areas": persona.focus_areas,
            "patience_ms": persona.silence_threshold_ms,
        })
    }
}

impl Default for PersonaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_error() -> ErrorResult {
        ErrorResult {
            original: "I has a book".to_string(),
            corrected: "I have a book".to_string(),
            error_type: "Subject-Verb Agreement".to_string(),
            explanation_english: "Use 'have' with 'I', not 'has'".to_string(),
            explanation_native: "'I' ke saath 'have' ka prayog karein, 'has' nahi".to_string(),
            rule_id: "I_HAS".to_string(),
            confidence: 0.95,
        }
    }

    #[test]
    fn unknown_mode_falls_back_to_general() {
        let registry = PersonaRegistry::new();
        assert_eq!(registry.get("Foo").mode, "General");
        assert!(registry.is_valid_mode("NDA"));
        assert!(!registry.is_valid_mode("Foo"));
    }

    #[test]
    fn interruption_threshold_is_inclusive() {
        let registry = PersonaRegistry::new();
        assert!(!registry.should_interrupt("NDA", 0.69));
        assert!(registry.should_interrupt("NDA", 0.70));
        assert!(registry.should_interrupt("NDA", 0.95));
    }

    #[test]
    fn interruption_message_carries_correction_and_native_tip() {
        let registry = PersonaRegistry::new();
        let msg = registry.interruption_message("SSB", "Hindi", &sample_error());
        assert!(msg.starts_with("That's a significant error. "));
        assert!(msg.contains("'I have a book'"));
        assert!(msg.contains("In Hindi:"));
        assert!(msg.ends_with("repeat the whole sentence correctly."));
    }

    #[test]
    fn nudge_respects_silence_threshold() {
        let registry = PersonaRegistry::new();
        assert!(registry.nudge_message("Tech", 5999).is_none());
        assert_eq!(
            registry.nudge_message("Tech", 6000),
            Some("Take a moment to structure your thoughts, then explain.")
        );
    }

    #[test]
    fn persona_card_labels_strictness() {
        let registry = PersonaRegistry::new();
        let card = registry.persona_card("UPSC");
        assert_eq!(card["strictness"], "Very Strict");
        assert_eq!(card["patience_ms"], 6000);
        let gentle = registry.persona_card("General");
        assert_eq!(gentle["strictness"], "Gentle");
    }

    #[test]
    fn system_prompt_embeds_native_language() {
        let registry = PersonaRegistry::new();
        let prompt = registry.system_prompt("HR", "Tamil");
        assert!(prompt.contains("behavioral interview"));
        assert!(prompt.contains("native language is Tamil"));
    }

    #[test]
    fn all_modes_present() {
        let registry = PersonaRegistry::new();
        let modes = registry.modes();
        for expected in ["NDA", "SSB", "Tech", "HR", "MBA", "UPSC", "General"] {
            assert!(modes.contains(&expected), "missing mode {expected}");
        }
    }
}
