use serde::Serialize;

/// Prompt profile for one kind of document collection.
///
/// Every profile asks for a bare JSON array of concepts during extraction and
/// for the full document with `[[wikilinks]]` (and no code fences) during linking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UseCase {
    #[default]
    ResearchLibrary,
    CourseMaterial,
    MeetingNotes,
    ProjectDocs,
}

impl UseCase {
    pub const ALL: [UseCase; 4] = [
        UseCase::ResearchLibrary,
        UseCase::CourseMaterial,
        UseCase::MeetingNotes,
        UseCase::ProjectDocs,
    ];

    /// Look up a profile by exact key. Unknown keys resolve to `research-library`.
    pub fn resolve(key: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|use_case| use_case.key() == key)
            .unwrap_or_default()
    }

    pub fn key(&self) -> &'static str {
        match self {
            UseCase::ResearchLibrary => "research-library",
            UseCase::CourseMaterial => "course-material",
            UseCase::MeetingNotes => "meeting-notes",
            UseCase::ProjectDocs => "project-docs",
        }
    }

    pub fn system_prompt(&self) -> &'static str {
        match self {
            UseCase::ResearchLibrary => RESEARCH_SYSTEM,
            UseCase::CourseMaterial => COURSE_SYSTEM,
            UseCase::MeetingNotes => MEETING_SYSTEM,
            UseCase::ProjectDocs => PROJECT_SYSTEM,
        }
    }

    pub fn extraction_prompt(&self, content: &str) -> String {
        let (intro, fields, schema) = match self {
            UseCase::ResearchLibrary => (
                "Analyze this research content and extract the key concepts that should become nodes in a knowledge graph.",
                "For each concept, provide:\n\
                 1. The concept name (2-5 words, title case)\n\
                 2. A brief description (1-2 sentences)\n\
                 3. Why it's significant in this content",
                r#"[
  {
    "name": "Concept Name",
    "description": "Brief description",
    "significance": "Why it matters"
  }
]"#,
            ),
            UseCase::CourseMaterial => (
                "Analyze this educational content and extract the key learning concepts.",
                "For each concept, provide:\n\
                 1. The concept name (2-5 words, title case)\n\
                 2. A brief definition (1-2 sentences)\n\
                 3. Difficulty level (beginner/intermediate/advanced)\n\
                 4. Prerequisites (if any)",
                r#"[
  {
    "name": "Concept Name",
    "description": "Brief definition",
    "level": "beginner|intermediate|advanced",
    "prerequisites": ["Concept1", "Concept2"]
  }
]"#,
            ),
            UseCase::MeetingNotes => (
                "Analyze these meeting notes and extract key entities for a knowledge graph.",
                "Extract:\n\
                 1. Projects/initiatives mentioned\n\
                 2. Key decisions\n\
                 3. Action items\n\
                 4. Topics discussed\n\
                 5. People mentioned (use roles, not names)",
                r#"[
  {
    "name": "Entity Name",
    "type": "project|decision|action|topic|person",
    "description": "Brief context"
  }
]"#,
            ),
            UseCase::ProjectDocs => (
                "Analyze this technical documentation and extract key technical concepts.",
                "Extract:\n\
                 1. Technical concepts/patterns\n\
                 2. System components\n\
                 3. Dependencies\n\
                 4. API/interfaces\n\
                 5. Architecture decisions",
                r#"[
  {
    "name": "Concept Name",
    "type": "concept|component|dependency|api|decision",
    "description": "Technical description"
  }
]"#,
            ),
        };

        format!(
            r#"{intro}

CONTENT:
{content}

{fields}

Return as JSON array:
{schema}

CRITICAL: Output ONLY valid JSON, no other text."#
        )
    }

    pub fn linking_prompt(&self, concepts: &[String], content: &str) -> String {
        let concept_list = concepts
            .iter()
            .map(|c| format!("- [[{}]]", c))
            .collect::<Vec<_>>()
            .join("\n");

        let (intro, heading, instructions) = match self {
            UseCase::ResearchLibrary => (
                "You are creating an interconnected knowledge graph. Given these concepts and the original content, rewrite the content with wikilinks.",
                "CONCEPTS TO LINK",
                "1. Add wikilinks [[Like This]] whenever you mention one of the concepts\n\
                 2. Only link concepts from the list above\n\
                 3. Link the FIRST occurrence in each section/paragraph\n\
                 4. Maintain the original structure and flow\n\
                 5. Don't force links - only where natural\n\
                 6. Keep all original information",
            ),
            UseCase::CourseMaterial => (
                "You are creating a learning-focused knowledge graph. Add wikilinks to show how concepts connect.",
                "CONCEPTS TO LINK",
                "1. Add wikilinks [[Like This]] for each concept\n\
                 2. Emphasize prerequisite relationships (e.g., \"To understand [[Advanced Topic]], first learn [[Basic Concept]]\")\n\
                 3. Link examples to the concepts they illustrate\n\
                 4. Maintain pedagogical flow\n\
                 5. Add \"See also:\" sections if helpful",
            ),
            UseCase::MeetingNotes => (
                "Create an interconnected meeting notes document with wikilinks.",
                "ENTITIES TO LINK",
                "1. Add wikilinks for projects, decisions, action items, and topics\n\
                 2. Help readers navigate between related meetings\n\
                 3. Maintain chronological flow\n\
                 4. Keep all original information",
            ),
            UseCase::ProjectDocs => (
                "Create interconnected technical documentation with wikilinks.",
                "TECHNICAL ENTITIES TO LINK",
                "1. Link technical concepts, components, and dependencies\n\
                 2. Show architectural relationships\n\
                 3. Connect related implementations\n\
                 4. Maintain technical accuracy",
            ),
        };

        format!(
            r#"{intro}

{heading}:
{concept_list}

ORIGINAL CONTENT:
{content}

INSTRUCTIONS:
{instructions}

Return the full content with wikilinks added. Do not wrap in markdown code blocks."#
        )
    }

    /// Relationship labels for this domain. Not consumed by the pipeline yet.
    pub fn relationship_types(&self) -> &'static [&'static str] {
        match self {
            UseCase::ResearchLibrary => &[
                "builds-upon",
                "contradicts",
                "supports",
                "prerequisite-for",
                "related-to",
                "example-of",
                "methodology-for",
            ],
            UseCase::CourseMaterial => &[
                "prerequisite-for",
                "builds-upon",
                "example-of",
                "applies-to",
                "related-to",
            ],
            UseCase::MeetingNotes => &[
                "relates-to",
                "blocks",
                "decided-in",
                "action-for",
                "discussed-in",
            ],
            UseCase::ProjectDocs => &[
                "depends-on",
                "implements",
                "relates-to",
                "decided-by",
                "alternative-to",
            ],
        }
    }
}

impl std::fmt::Display for UseCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

const RESEARCH_SYSTEM: &str = "You are an expert knowledge graph architect specializing in academic research organization. \
Your goal is to identify key concepts, theories, methodologies, and connections across research materials to create an interconnected web of knowledge.

Focus on:
- Core concepts and theories
- Methodologies and frameworks
- Key findings and conclusions
- Relationships between ideas
- Prerequisites and dependencies
- Contradictions or debates
- Related research areas";

const COURSE_SYSTEM: &str = "You are an expert educational content organizer. \
Your goal is to create a learning-optimized knowledge graph that shows how concepts build upon each other, highlights prerequisites, and creates clear learning paths.

Focus on:
- Foundational concepts vs advanced topics
- Prerequisites and dependencies
- Examples and applications
- Common misconceptions
- Practice opportunities
- Real-world applications";

const MEETING_SYSTEM: &str = "You are an expert at organizing business communications and project documentation. \
Your goal is to create a knowledge graph that connects decisions, action items, projects, people, and topics across meetings.

Focus on:
- Key decisions made
- Action items and owners
- Project references
- Recurring topics
- People and roles
- Blockers and dependencies";

const PROJECT_SYSTEM: &str = "You are an expert at organizing technical documentation and project knowledge. \
Your goal is to create a knowledge graph that connects architecture decisions, technical concepts, dependencies, and implementation details.

Focus on:
- Technical concepts and patterns
- Architecture decisions
- System dependencies
- API endpoints and interfaces
- Implementation details
- Technical debt and decisions";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_keys() {
        assert_eq!(UseCase::resolve("course-material"), UseCase::CourseMaterial);
        assert_eq!(UseCase::resolve("meeting-notes"), UseCase::MeetingNotes);
        assert_eq!(UseCase::resolve("project-docs"), UseCase::ProjectDocs);

        for use_case in UseCase::ALL {
            assert_eq!(UseCase::resolve(use_case.key()), use_case);
        }
    }

    #[test]
    fn test_resolve_falls_back_to_research_library() {
        assert_eq!(UseCase::resolve("cooking-recipes"), UseCase::ResearchLibrary);
        assert_eq!(UseCase::resolve(""), UseCase::ResearchLibrary);
        // Lookup is exact: padded or differently cased keys fall back too
        assert_eq!(UseCase::resolve(" project-docs "), UseCase::ResearchLibrary);
        assert_eq!(UseCase::resolve("Project-Docs"), UseCase::ResearchLibrary);
    }

    #[test]
    fn test_extraction_prompt_embeds_content_and_demands_json() {
        for use_case in UseCase::ALL {
            let prompt = use_case.extraction_prompt("Neural networks learn.");
            assert!(prompt.contains("Neural networks learn."));
            assert!(prompt.contains("JSON array"));
            assert!(prompt.contains("Output ONLY valid JSON"));
            assert!(prompt.contains(r#""name":"#));
        }
    }

    #[test]
    fn test_linking_prompt_lists_concepts_and_forbids_fences() {
        let concepts = vec!["Graph Theory".to_string(), "Backpropagation".to_string()];

        for use_case in UseCase::ALL {
            let prompt = use_case.linking_prompt(&concepts, "Body text");
            assert!(prompt.contains("- [[Graph Theory]]\n- [[Backpropagation]]"));
            assert!(prompt.contains("Body text"));
            assert!(prompt.contains("Do not wrap in markdown code blocks."));
        }
    }

    #[test]
    fn test_every_profile_has_vocabulary() {
        for use_case in UseCase::ALL {
            assert!(!use_case.relationship_types().is_empty());
            assert!(!use_case.system_prompt().is_empty());
        }
        assert_eq!(UseCase::ProjectDocs.relationship_types()[0], "depends-on");
    }
}
