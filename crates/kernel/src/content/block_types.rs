//! Block type registry and server-side block validation.
//!
//! Provides:
//! - `BlockTypeDefinition`: label, description and required capability per type
//! - `BlockTemplate`: pre-configured starting content for new blocks
//! - `Capabilities`: the capability keys granted to an organization
//! - `BlockTypeRegistry`: availability filtering, templates and validation

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::content::block_render::is_safe_url;
use crate::error::{AppError, AppResult};
use crate::models::block_content::{
    AccordionContent, AccordionItem, BlockContent, BlockType, CaptionedText, ImageLayout,
    ImageTextContent, MediaImage, PollContent, PollQuestion, StorySection, StorytellingContent,
    TimelineContent, TimelineEvent,
};
use crate::models::BlockStatus;

/// Capability required to edit content at all.
pub const CMS_ACCESS: &str = "cms_access";

/// Capability required to change document styling.
pub const CMS_STYLING: &str = "cms_styling";

/// Content limits shared by validation and the editing form.
pub mod limits {
    pub const TITLE: usize = 200;
    pub const BODY: usize = 5000;
    pub const SHORT_BODY: usize = 2000;
    pub const CAPTION: usize = 500;
    pub const ALT: usize = 200;
    pub const QUESTION: usize = 300;
    pub const OPTION: usize = 200;
    pub const DATE: usize = 50;
    pub const IMAGES: usize = 10;
    pub const SECTIONS: usize = 20;
    pub const QUESTIONS: usize = 3;
    pub const OPTIONS: usize = 5;
    pub const MIN_OPTIONS: usize = 2;
    pub const ACCORDION_ITEMS: usize = 20;
    pub const TIMELINE_EVENTS: usize = 50;
}

/// Capability keys granted to an organization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capabilities(BTreeSet<String>);

impl Capabilities {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(keys.into_iter().map(Into::into).collect())
    }

    pub fn has(&self, key: &str) -> bool {
        self.0.contains(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Definition of a single block type.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockTypeDefinition {
    #[serde(rename = "type")]
    pub block_type: BlockType,
    pub label: &'static str,
    pub description: &'static str,
    /// Capability key that unlocks this type.
    pub capability: &'static str,
}

impl BlockTypeDefinition {
    fn of(block_type: BlockType) -> Self {
        let (label, description, capability) = match block_type {
            BlockType::Storytelling => (
                "Storytelling",
                "Tell the story behind the product with text, images and sections",
                "block_storytelling",
            ),
            BlockType::MultiQuestionPoll => (
                "Poll",
                "Ask readers up to three multiple-choice questions",
                "block_quick_poll",
            ),
            BlockType::ImageText => (
                "Image + Text",
                "An image next to a heading and body text",
                "block_image_text",
            ),
            BlockType::Text => ("Text", "A heading and a paragraph of text", CMS_ACCESS),
            BlockType::Image => ("Image", "A single image or a small gallery", CMS_ACCESS),
            BlockType::Video => ("Video", "An embedded video", CMS_ACCESS),
            BlockType::Accordion => (
                "Accordion",
                "Collapsible question and answer items",
                CMS_ACCESS,
            ),
            BlockType::Timeline => ("Timeline", "Dated milestones in order", CMS_ACCESS),
        };
        Self {
            block_type,
            label,
            description,
            capability,
        }
    }
}

/// Pre-configured starting content for a new block.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockTemplate {
    pub id: &'static str,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    pub name: &'static str,
    pub description: &'static str,
    pub default_content: BlockContent,
}

fn standard_templates() -> Vec<BlockTemplate> {
    let section = |heading: &str, text: &str| StorySection {
        heading: heading.to_string(),
        text: text.to_string(),
        image: String::new(),
    };

    vec![
        BlockTemplate {
            id: "storytelling_intro",
            block_type: BlockType::Storytelling,
            name: "Introduction story",
            description: "Title, description and images introducing the brand",
            default_content: BlockContent::Storytelling(StorytellingContent {
                title: "Our story".to_string(),
                description: "Tell your brand story and what sets you apart.".to_string(),
                images: Vec::new(),
                sections: vec![section(
                    "Our mission",
                    "Describe your mission and values.",
                )],
            }),
        },
        BlockTemplate {
            id: "storytelling_sustainability",
            block_type: BlockType::Storytelling,
            name: "Sustainability story",
            description: "A story focused on sustainability",
            default_content: BlockContent::Storytelling(StorytellingContent {
                title: "Sustainability".to_string(),
                description: "How we make sustainable products and protect the environment."
                    .to_string(),
                images: Vec::new(),
                sections: vec![
                    section(
                        "Sustainable materials",
                        "We only use sustainable, certified materials.",
                    ),
                    section(
                        "Circular economy",
                        "Our commitment to a circular economy.",
                    ),
                ],
            }),
        },
        BlockTemplate {
            id: "multi_question_poll_feedback",
            block_type: BlockType::MultiQuestionPoll,
            name: "Feedback poll",
            description: "Interactive poll collecting reader feedback",
            default_content: BlockContent::MultiQuestionPoll(PollContent {
                questions: vec![PollQuestion {
                    question: "How satisfied are you with our product?".to_string(),
                    options: ["Very satisfied", "Satisfied", "Neutral", "Unsatisfied"]
                        .into_iter()
                        .map(String::from)
                        .collect(),
                }],
                completion_message: "Thank you for taking part!".to_string(),
            }),
        },
        BlockTemplate {
            id: "image_text_product",
            block_type: BlockType::ImageText,
            name: "Product image + text",
            description: "Present the product with an image and description",
            default_content: BlockContent::ImageText(ImageTextContent {
                layout: ImageLayout::ImageLeft,
                image: MediaImage {
                    alt: "Product image".to_string(),
                    ..Default::default()
                },
                text: CaptionedText {
                    heading: "Our product".to_string(),
                    content: "Describe the key properties and benefits of your product."
                        .to_string(),
                },
            }),
        },
        BlockTemplate {
            id: "image_text_features",
            block_type: BlockType::ImageText,
            name: "Features image + text",
            description: "Highlight product features next to an image",
            default_content: BlockContent::ImageText(ImageTextContent {
                layout: ImageLayout::ImageRight,
                image: MediaImage {
                    alt: "Product features".to_string(),
                    ..Default::default()
                },
                text: CaptionedText {
                    heading: "Product features".to_string(),
                    content: "List the most important features and benefits.".to_string(),
                },
            }),
        },
    ]
}

/// Registry of block type definitions and templates.
#[derive(Debug, Clone)]
pub struct BlockTypeRegistry {
    definitions: Vec<BlockTypeDefinition>,
    templates: Vec<BlockTemplate>,
    /// Whether an empty capability set grants every type.
    fail_open: bool,
}

impl Default for BlockTypeRegistry {
    fn default() -> Self {
        Self::new(true)
    }
}

impl BlockTypeRegistry {
    /// Create a registry with every block type and the standard templates.
    pub fn new(fail_open: bool) -> Self {
        Self {
            definitions: BlockType::ALL
                .into_iter()
                .map(BlockTypeDefinition::of)
                .collect(),
            templates: standard_templates(),
            fail_open,
        }
    }

    pub fn fail_open(&self) -> bool {
        self.fail_open
    }

    /// Look up the definition of a block type.
    pub fn get(&self, block_type: BlockType) -> Option<&BlockTypeDefinition> {
        self.definitions.iter().find(|d| d.block_type == block_type)
    }

    /// Whether an empty grant set should be treated as "everything granted".
    fn open_on_empty(&self, granted: &Capabilities) -> Option<bool> {
        if !granted.is_empty() {
            return None;
        }
        if self.fail_open {
            warn!("no capabilities resolved; allowing all block types");
        }
        Some(self.fail_open)
    }

    /// Whether a capability key is granted, honoring the empty-set policy.
    pub fn is_granted(&self, capability: &str, granted: &Capabilities) -> bool {
        self.open_on_empty(granted)
            .unwrap_or_else(|| granted.has(capability))
    }

    pub fn is_available(&self, block_type: BlockType, granted: &Capabilities) -> bool {
        self.get(block_type)
            .is_some_and(|d| self.is_granted(d.capability, granted))
    }

    /// Block types whose capability is granted, in picker order.
    pub fn list_available(&self, granted: &Capabilities) -> Vec<&BlockTypeDefinition> {
        if let Some(open) = self.open_on_empty(granted) {
            return if open {
                self.definitions.iter().collect()
            } else {
                Vec::new()
            };
        }
        self.definitions
            .iter()
            .filter(|d| granted.has(d.capability))
            .collect()
    }

    /// Reject a block type the organization may not use.
    pub fn ensure_available(&self, block_type: BlockType, granted: &Capabilities) -> AppResult<()> {
        if self.is_available(block_type, granted) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "block type '{block_type}' is not available for this organization"
            )))
        }
    }

    /// Default content for a new block of a type.
    pub fn default_content(&self, block_type: BlockType) -> BlockContent {
        match block_type {
            BlockType::MultiQuestionPoll => BlockContent::MultiQuestionPoll(PollContent {
                questions: vec![PollQuestion {
                    question: String::new(),
                    options: vec![String::new(), String::new()],
                }],
                completion_message: String::new(),
            }),
            BlockType::Accordion => BlockContent::Accordion(AccordionContent {
                title: String::new(),
                items: vec![AccordionItem::default()],
            }),
            BlockType::Timeline => BlockContent::Timeline(TimelineContent {
                title: String::new(),
                events: vec![TimelineEvent::default()],
            }),
            other => BlockContent::empty(other),
        }
    }

    pub fn template(&self, id: &str) -> Option<&BlockTemplate> {
        self.templates.iter().find(|t| t.id == id)
    }

    pub fn templates_for(&self, block_type: BlockType) -> Vec<&BlockTemplate> {
        self.templates
            .iter()
            .filter(|t| t.block_type == block_type)
            .collect()
    }

    /// Templates whose block type is available.
    pub fn available_templates(&self, granted: &Capabilities) -> Vec<&BlockTemplate> {
        self.templates
            .iter()
            .filter(|t| self.is_available(t.block_type, granted))
            .collect()
    }

    /// Initial content for a new block: the template's content or the type default.
    pub fn initial_content(
        &self,
        block_type: BlockType,
        template_id: Option<&str>,
    ) -> AppResult<BlockContent> {
        let Some(id) = template_id else {
            return Ok(self.default_content(block_type));
        };
        let template = self
            .template(id)
            .ok_or_else(|| AppError::validation(format!("unknown template '{id}'")))?;
        if template.block_type != block_type {
            return Err(AppError::validation(format!(
                "template '{id}' is for {} blocks, not {block_type}",
                template.block_type
            )));
        }
        Ok(template.default_content.clone())
    }

    /// Validate block content.
    ///
    /// Drafts are checked leniently (limits and URL schemes only); published
    /// blocks must also have their required fields filled in.
    pub fn validate(&self, content: &BlockContent, status: BlockStatus) -> Vec<String> {
        let mut check = Checker::new(content.block_type(), status == BlockStatus::Published);

        match content {
            BlockContent::Storytelling(c) => {
                check.text("title", &c.title, limits::TITLE, true);
                check.text("description", &c.description, limits::BODY, false);
                check.items("images", c.images.len(), 0, limits::IMAGES);
                for (i, image) in c.images.iter().enumerate() {
                    check.url(&format!("images[{i}].url"), &image.url, true);
                    check.text(&format!("images[{i}].alt"), &image.alt, limits::ALT, false);
                    check.text(
                        &format!("images[{i}].caption"),
                        &image.caption,
                        limits::CAPTION,
                        false,
                    );
                }
                check.items("sections", c.sections.len(), 0, limits::SECTIONS);
                for (i, section) in c.sections.iter().enumerate() {
                    check.text(
                        &format!("sections[{i}].heading"),
                        &section.heading,
                        limits::TITLE,
                        false,
                    );
                    check.text(&format!("sections[{i}].text"), &section.text, limits::BODY, false);
                    check.url(&format!("sections[{i}].image"), &section.image, false);
                }
            }
            BlockContent::MultiQuestionPoll(c) => {
                check.items("questions", c.questions.len(), 1, limits::QUESTIONS);
                for (i, q) in c.questions.iter().enumerate() {
                    check.text(
                        &format!("questions[{i}].question"),
                        &q.question,
                        limits::QUESTION,
                        true,
                    );
                    check.items(
                        &format!("questions[{i}].options"),
                        q.options.len(),
                        limits::MIN_OPTIONS,
                        limits::OPTIONS,
                    );
                    for (j, option) in q.options.iter().enumerate() {
                        check.text(
                            &format!("questions[{i}].options[{j}]"),
                            option,
                            limits::OPTION,
                            true,
                        );
                    }
                }
                check.text(
                    "completionMessage",
                    &c.completion_message,
                    limits::CAPTION,
                    false,
                );
            }
            BlockContent::ImageText(c) => {
                check.url("image.url", &c.image.url, true);
                check.text("image.alt", &c.image.alt, limits::ALT, false);
                check.text("image.caption", &c.image.caption, limits::CAPTION, false);
                check.text("text.heading", &c.text.heading, limits::TITLE, false);
                check.text("text.content", &c.text.content, limits::BODY, true);
            }
            BlockContent::Text(c) => {
                check.text("heading", &c.heading, limits::TITLE, false);
                check.text("text", &c.text, limits::BODY, true);
            }
            BlockContent::Image(c) => {
                let urls = c.url.urls();
                check.items("url", urls.len(), 1, limits::IMAGES);
                for (i, url) in urls.iter().enumerate() {
                    check.url(&format!("url[{i}]"), url, true);
                }
                check.text("alt", &c.alt, limits::ALT, false);
                check.text("caption", &c.caption, limits::CAPTION, false);
            }
            BlockContent::Video(c) => {
                check.url("url", &c.url, true);
                check.text("title", &c.title, limits::TITLE, false);
                check.text("description", &c.description, limits::SHORT_BODY, false);
            }
            BlockContent::Accordion(c) => {
                check.text("title", &c.title, limits::TITLE, false);
                check.items("items", c.items.len(), 1, limits::ACCORDION_ITEMS);
                for (i, item) in c.items.iter().enumerate() {
                    check.text(&format!("items[{i}].title"), &item.title, limits::TITLE, true);
                    check.text(
                        &format!("items[{i}].content"),
                        &item.content,
                        limits::BODY,
                        false,
                    );
                }
            }
            BlockContent::Timeline(c) => {
                check.text("title", &c.title, limits::TITLE, false);
                check.items("events", c.events.len(), 1, limits::TIMELINE_EVENTS);
                for (i, event) in c.events.iter().enumerate() {
                    check.text(&format!("events[{i}].date"), &event.date, limits::DATE, true);
                    check.text(&format!("events[{i}].title"), &event.title, limits::TITLE, true);
                    check.text(
                        &format!("events[{i}].description"),
                        &event.description,
                        limits::SHORT_BODY,
                        false,
                    );
                }
            }
        }

        check.errors
    }
}

/// Accumulates validation errors for one block.
struct Checker {
    block_type: BlockType,
    strict: bool,
    errors: Vec<String>,
}

impl Checker {
    fn new(block_type: BlockType, strict: bool) -> Self {
        Self {
            block_type,
            strict,
            errors: Vec::new(),
        }
    }

    fn push(&mut self, field: &str, message: impl std::fmt::Display) {
        self.errors
            .push(format!("{}: '{field}' {message}", self.block_type));
    }

    fn text(&mut self, field: &str, value: &str, max: usize, required: bool) {
        if required && self.strict && value.trim().is_empty() {
            self.push(field, "is required");
        }
        if value.chars().count() > max {
            self.push(field, format_args!("must be at most {max} characters"));
        }
    }

    fn items(&mut self, field: &str, len: usize, min: usize, max: usize) {
        if self.strict && len < min {
            self.push(field, format_args!("must have at least {min} entries"));
        }
        if len > max {
            self.push(field, format_args!("must have at most {max} entries"));
        }
    }

    fn url(&mut self, field: &str, value: &str, required: bool) {
        if value.is_empty() {
            if required && self.strict {
                self.push(field, "is required");
            }
            return;
        }
        if !is_safe_url(value) {
            self.push(field, "must be an http(s) URL or a site-relative path");
        }
    }
}
