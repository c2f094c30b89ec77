use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Personality {
    pub id: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
    pub model: &'static str,
    #[serde(skip)]
    pub system_prompt: &'static str,
}

pub static PERSONALITIES: [Personality; 5] = [
    Personality {
        id: "general",
        name: "General Assistant",
        icon: "🤖",
        model: "llama3.1-8b",
        system_prompt: "You are a friendly general-purpose assistant. Give clear, accurate and \
            concise answers. Say so plainly when you do not know something.",
    },
    Personality {
        id: "coding",
        name: "Coding Assistant",
        icon: "💻",
        model: "llama3.1-70b",
        system_prompt: "You are an experienced software engineer who mentors others. Write clean, \
            idiomatic code, explain the reasoning behind it, and help track down bugs. Put code in \
            fenced markdown blocks.",
    },
    Personality {
        id: "support",
        name: "Customer Support",
        icon: "💬",
        model: "llama3.1-8b",
        system_prompt: "You are a patient customer support agent. Work through problems step by \
            step, ask clarifying questions when the issue is unclear, and suggest escalation when \
            you cannot resolve it.",
    },
    Personality {
        id: "creative",
        name: "Creative Writer",
        icon: "✍️",
        model: "llama-3.3-70b",
        system_prompt: "You are an imaginative writing partner. Help brainstorm ideas, develop \
            characters and plots, and give constructive feedback on drafts in any genre.",
    },
    Personality {
        id: "tutor",
        name: "Educational Tutor",
        icon: "📚",
        model: "llama3.1-70b",
        system_prompt: "You are a tutor who breaks hard topics into simple steps. Use examples and \
            analogies, adapt to the student's level, and check understanding with short questions.",
    },
];

/// Unknown ids get the general assistant.
pub fn personality(id: &str) -> &'static Personality {
    PERSONALITIES
        .iter()
        .find(|p| p.id == id)
        .unwrap_or(&PERSONALITIES[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_falls_back_to_general() {
        assert_eq!(personality("coding").name, "Coding Assistant");
        assert_eq!(personality("tutor").model, "llama3.1-70b");
        assert_eq!(personality("pirate").id, "general");
        assert_eq!(personality("").id, "general");
    }

    #[test]
    fn prompt_is_not_serialized() {
        let value = serde_json::to_value(personality("creative")).unwrap();
        assert_eq!(value["model"], "llama-3.3-70b");
        assert!(value.get("system_prompt").is_none());
    }
}
