//! Persona registry: named voice/instruction profiles injected into prompts.
//!
//! The registry is built once at startup and read-only afterwards. Lookup is
//! total: unknown keys resolve to the default persona rather than erroring.

use serde::{Deserialize, Serialize};

/// Key of the guaranteed fallback persona.
pub const DEFAULT_PERSONA_KEY: &str = "default";

/// A named voice profile: lookup key, display name, and instruction text.
///
/// The prompt text is opaque configuration data; nothing in the pipeline
/// interprets it beyond substitution into the system prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaDefinition {
    pub key: String,
    pub name: String,
    pub prompt: String,
}

/// Immutable persona table with total lookup.
#[derive(Debug, Clone)]
pub struct PersonaRegistry {
    personas: Vec<PersonaDefinition>,
    default: PersonaDefinition,
}

impl PersonaRegistry {
    /// Build the registry from the built-in persona table.
    pub fn builtin() -> Self {
        let personas = builtin_personas();
        let default = personas
            .iter()
            .find(|p| p.key == DEFAULT_PERSONA_KEY)
            .cloned()
            .unwrap_or_else(|| personas[0].clone());
        Self { personas, default }
    }

    /// Merge config-provided personas into the registry.
    ///
    /// An override with a known key replaces that persona (including the
    /// default); a new key is appended after the built-ins.
    pub fn with_overrides(mut self, overrides: &[PersonaDefinition]) -> Self {
        for entry in overrides {
            match self.personas.iter_mut().find(|p| p.key == entry.key) {
                Some(existing) => *existing = entry.clone(),
                None => self.personas.push(entry.clone()),
            }
        }
        if let Some(default) = self
            .personas
            .iter()
            .find(|p| p.key == DEFAULT_PERSONA_KEY)
        {
            self.default = default.clone();
        }
        self
    }

    /// Resolve a persona by key. Total: unknown keys yield the default.
    pub fn resolve(&self, key: &str) -> &PersonaDefinition {
        self.personas
            .iter()
            .find(|p| p.key == key)
            .unwrap_or(&self.default)
    }

    /// Whether a key names a registered persona.
    pub fn contains(&self, key: &str) -> bool {
        self.personas.iter().any(|p| p.key == key)
    }

    /// Iterate personas in declaration order (built-ins first).
    pub fn iter(&self) -> impl Iterator<Item = &PersonaDefinition> {
        self.personas.iter()
    }
}

fn persona(key: &str, name: &str, prompt: &str) -> PersonaDefinition {
    PersonaDefinition {
        key: key.into(),
        name: name.into(),
        prompt: prompt.trim().into(),
    }
}

fn builtin_personas() -> Vec<PersonaDefinition> {
    vec![
        persona(
            "mandela",
            "Nelson Mandela",
            r#"
You are Nelson Mandela (1918-2013), embodying the full depth of his life
experience, wisdom, and moral authority. Draw on his complete biography:
childhood in Mvezo and the household of Chief Jongintaba; legal formation at
Witwatersrand and the first black law firm in South Africa, founded with
Oliver Tambo; the evolution from Youth League activism through the Defiance
Campaign to Umkhonto we Sizwe; twenty-seven years in prison, from the Robben
Island limestone quarry to the negotiations at Victor Verster; the Truth and
Reconciliation Commission and a single presidential term stepped away from
willingly.

Answer from his philosophical architecture: ubuntu ("I am because we are"),
reconciliation without amnesia, struggle understood as generational, power
held as responsibility to lift others. Speak with his measured cadence,
self-deprecating humor, quiet authority, and indomitable hope, illustrating
universal truths with personal anecdotes: the Rivonia Trial speech, a first
vote at age 76, walking free from Victor Verster.

NEVER begin responses with labels like "Nelson Mandela's Response:" or "As
Nelson Mandela:". You ARE Mandela - respond directly in first person with no
preamble and no meta-commentary about roleplaying.
"#,
        ),
        persona(
            "einstein",
            "Albert Einstein",
            "You are Albert Einstein. Respond with deep scientific insight, mathematical \
             precision, and your characteristic philosophical perspective. Reference your \
             own work when relevant and maintain your German-accented English style.",
        ),
        persona(
            "newton",
            "Isaac Newton",
            "You are Sir Isaac Newton. Respond with mathematical rigor, systematic \
             approach, and references to your laws of motion, calculus, and optics. Use \
             formal 17th-century English style.",
        ),
        persona(
            "darwin",
            "Charles Darwin",
            "You are Charles Darwin. Respond with detailed observations, evolutionary \
             perspective, and references to your voyages and evolutionary theory. Use \
             Victorian-era English with naturalist terminology.",
        ),
        persona(
            "tesla",
            "Nikola Tesla",
            "You are Nikola Tesla. Respond with visionary thinking about technology, \
             references to your inventions, and enthusiasm for wireless technology and AC \
             power. Use Serbian-accented English.",
        ),
        persona(
            "curie",
            "Marie Curie",
            "You are Marie Curie. Respond with rigorous scientific methodology, \
             references to your work on radioactivity, and your perspective as a woman in \
             science. Use Polish-accented English with scientific precision.",
        ),
        persona(
            DEFAULT_PERSONA_KEY,
            "Academic Scholar",
            "You are a distinguished academic scholar. Provide comprehensive, \
             well-researched answers with multiple perspectives, academic rigor, and \
             clear explanations for complex topics.",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_known_key() {
        let registry = PersonaRegistry::builtin();
        let persona = registry.resolve("einstein");
        assert_eq!(persona.name, "Albert Einstein");
        assert!(persona.prompt.contains("German-accented"));
    }

    #[test]
    fn resolve_unknown_key_yields_default() {
        let registry = PersonaRegistry::builtin();
        let persona = registry.resolve("socrates");
        assert_eq!(persona.key, DEFAULT_PERSONA_KEY);
        assert_eq!(persona.name, "Academic Scholar");
    }

    #[test]
    fn overrides_replace_and_append() {
        let registry = PersonaRegistry::builtin().with_overrides(&[
            PersonaDefinition {
                key: "einstein".into(),
                name: "A. Einstein".into(),
                prompt: "Custom instructions.".into(),
            },
            PersonaDefinition {
                key: "nyerere".into(),
                name: "Julius Nyerere".into(),
                prompt: "You are Julius Nyerere.".into(),
            },
        ]);

        assert_eq!(registry.resolve("einstein").name, "A. Einstein");
        assert!(registry.contains("nyerere"));
        assert_eq!(registry.resolve("nyerere").name, "Julius Nyerere");
    }

    #[test]
    fn override_of_default_applies_to_unknown_keys() {
        let registry = PersonaRegistry::builtin().with_overrides(&[PersonaDefinition {
            key: DEFAULT_PERSONA_KEY.into(),
            name: "Generalist".into(),
            prompt: "Answer plainly.".into(),
        }]);
        assert_eq!(registry.resolve("nobody").name, "Generalist");
    }

    #[test]
    fn iteration_preserves_declaration_order() {
        let registry = PersonaRegistry::builtin();
        let keys: Vec<&str> = registry.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys[0], "mandela");
        assert_eq!(*keys.last().unwrap(), DEFAULT_PERSONA_KEY);
    }
}
