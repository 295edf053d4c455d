//! Block type keys and the type-tagged block payload.
//!
//! `BlockContent` is a sum type keyed by the block type, so every consumer
//! (validator, editor, renderer) matches it exhaustively and a new block
//! type is a single compile-checked change.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Closed set of block type keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    Storytelling,
    MultiQuestionPoll,
    ImageText,
    Text,
    Image,
    Video,
    Accordion,
    Timeline,
}

impl BlockType {
    /// Every block type, in picker order.
    pub const ALL: [BlockType; 8] = [
        BlockType::Storytelling,
        BlockType::MultiQuestionPoll,
        BlockType::ImageText,
        BlockType::Text,
        BlockType::Image,
        BlockType::Video,
        BlockType::Accordion,
        BlockType::Timeline,
    ];

    /// Machine key as stored and sent over the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            BlockType::Storytelling => "storytelling",
            BlockType::MultiQuestionPoll => "multi_question_poll",
            BlockType::ImageText => "image_text",
            BlockType::Text => "text",
            BlockType::Image => "image",
            BlockType::Video => "video",
            BlockType::Accordion => "accordion",
            BlockType::Timeline => "timeline",
        }
    }

    /// Parse a machine key.
    pub fn parse(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == key)
    }
}

impl std::fmt::Display for BlockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declares a closed string-valued option set (alignment, layout, ...).
macro_rules! choice {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $key:literal),+ $(,)? } default $default:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $key)] $variant,)+
        }

        impl $name {
            /// All accepted keys.
            pub const OPTIONS: &'static [&'static str] = &[$($key),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $key,)+
                }
            }

            pub fn parse(value: &str) -> Option<Self> {
                match value {
                    $($key => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::$default
            }
        }
    };
}

choice!(
    /// Horizontal alignment of text or media.
    Alignment { Left => "left", Center => "center", Right => "right" } default Left
);
choice!(FontSize { Small => "small", Medium => "medium", Large => "large" } default Medium);
choice!(FontWeight { Normal => "normal", Bold => "bold" } default Normal);
choice!(FontStyle { Normal => "normal", Italic => "italic" } default Normal);
choice!(TextDecoration { None => "none", Underline => "underline" } default None);
choice!(
    /// Placement of the image relative to the text in an image+text block.
    ImageLayout {
        ImageLeft => "image_left",
        ImageRight => "image_right",
        ImageTop => "image_top",
        ImageBottom => "image_bottom",
    } default ImageLeft
);

/// An image reference with accessibility text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MediaImage {
    pub url: String,
    pub alt: String,
    pub caption: String,
}

/// One sub-section of a storytelling block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StorySection {
    pub heading: String,
    pub text: String,
    pub image: String,
}

/// Narrative block: title, body, gallery and sections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StorytellingContent {
    pub title: String,
    pub description: String,
    pub images: Vec<MediaImage>,
    pub sections: Vec<StorySection>,
}

/// A single poll question with its answer options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PollQuestion {
    pub question: String,
    pub options: Vec<String>,
}

/// Poll block with up to three questions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PollContent {
    pub questions: Vec<PollQuestion>,
    pub completion_message: String,
}

/// Text half of an image+text block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CaptionedText {
    pub heading: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImageTextContent {
    pub layout: ImageLayout,
    pub image: MediaImage,
    pub text: CaptionedText,
}

/// Plain text block with block-level text properties only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextContent {
    pub heading: String,
    pub text: String,
    pub alignment: Alignment,
    pub font_size: FontSize,
    pub font_weight: FontWeight,
    pub font_style: FontStyle,
    pub text_decoration: TextDecoration,
}

/// Image source: a single URL or a gallery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageUrls {
    Single(String),
    Multiple(Vec<String>),
}

impl Default for ImageUrls {
    fn default() -> Self {
        ImageUrls::Single(String::new())
    }
}

impl ImageUrls {
    /// All non-empty URLs.
    pub fn urls(&self) -> Vec<&str> {
        match self {
            ImageUrls::Single(url) => [url.as_str()]
                .into_iter()
                .filter(|u| !u.is_empty())
                .collect(),
            ImageUrls::Multiple(urls) => urls
                .iter()
                .map(String::as_str)
                .filter(|u| !u.is_empty())
                .collect(),
        }
    }

    /// Raw entries in form order, empty ones included.
    pub fn entries(&self) -> Vec<&str> {
        match self {
            ImageUrls::Single(url) if url.is_empty() => Vec::new(),
            ImageUrls::Single(url) => vec![url.as_str()],
            ImageUrls::Multiple(urls) => urls.iter().map(String::as_str).collect(),
        }
    }

    /// Turn a single URL into a one-element gallery (an empty one into none).
    pub fn promote(&mut self) {
        if let ImageUrls::Single(url) = self {
            let first = std::mem::take(url);
            let list = if first.is_empty() { Vec::new() } else { vec![first] };
            *self = ImageUrls::Multiple(list);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImageContent {
    pub url: ImageUrls,
    pub alt: String,
    pub caption: String,
    pub alignment: Alignment,
}

impl Default for ImageContent {
    fn default() -> Self {
        Self {
            url: ImageUrls::default(),
            alt: String::new(),
            caption: String::new(),
            alignment: Alignment::Center,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VideoContent {
    pub url: String,
    pub title: String,
    pub description: String,
    pub autoplay: bool,
    #[serde(rename = "loop")]
    pub looped: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AccordionItem {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AccordionContent {
    pub title: String,
    pub items: Vec<AccordionItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimelineEvent {
    pub date: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimelineContent {
    pub title: String,
    pub events: Vec<TimelineEvent>,
}

/// Type-tagged block payload.
///
/// Serialized adjacently as `{"type": "<key>", "content": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum BlockContent {
    Storytelling(StorytellingContent),
    MultiQuestionPoll(PollContent),
    ImageText(ImageTextContent),
    Text(TextContent),
    Image(ImageContent),
    Video(VideoContent),
    Accordion(AccordionContent),
    Timeline(TimelineContent),
}

impl BlockContent {
    /// The type key of this payload.
    pub fn block_type(&self) -> BlockType {
        match self {
            BlockContent::Storytelling(_) => BlockType::Storytelling,
            BlockContent::MultiQuestionPoll(_) => BlockType::MultiQuestionPoll,
            BlockContent::ImageText(_) => BlockType::ImageText,
            BlockContent::Text(_) => BlockType::Text,
            BlockContent::Image(_) => BlockType::Image,
            BlockContent::Video(_) => BlockType::Video,
            BlockContent::Accordion(_) => BlockType::Accordion,
            BlockContent::Timeline(_) => BlockType::Timeline,
        }
    }

    /// Empty payload for a block type.
    pub fn empty(block_type: BlockType) -> Self {
        match block_type {
            BlockType::Storytelling => BlockContent::Storytelling(Default::default()),
            BlockType::MultiQuestionPoll => BlockContent::MultiQuestionPoll(Default::default()),
            BlockType::ImageText => BlockContent::ImageText(Default::default()),
            BlockType::Text => BlockContent::Text(Default::default()),
            BlockType::Image => BlockContent::Image(Default::default()),
            BlockType::Video => BlockContent::Video(Default::default()),
            BlockType::Accordion => BlockContent::Accordion(Default::default()),
            BlockType::Timeline => BlockContent::Timeline(Default::default()),
        }
    }

    /// Build a payload from a type key and a raw JSON content object.
    ///
    /// `null` is treated as an empty object; missing fields take defaults.
    pub fn from_parts(block_type: BlockType, content: Value) -> Result<Self, serde_json::Error> {
        let content = if content.is_null() {
            Value::Object(Default::default())
        } else {
            content
        };
        serde_json::from_value(serde_json::json!({
            "type": block_type.as_str(),
            "content": content,
        }))
    }

    /// The raw JSON content object, without the type tag.
    pub fn content_json(&self) -> Result<Value, serde_json::Error> {
        let mut tagged = serde_json::to_value(self)?;
        Ok(tagged
            .get_mut("content")
            .map(Value::take)
            .unwrap_or(Value::Null))
    }
}
