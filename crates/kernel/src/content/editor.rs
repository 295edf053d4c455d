//! Block editing surface.
//!
//! Produces the type-specific form for a block and applies field-level
//! edits to its content. `BlockEditor` ties an open block to an
//! `AutoSaver`, so every edit is reflected locally at once and persisted
//! through the debounced save path.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::content::autosave::{AutoSaveSettings, AutoSaver, SaveStatus, SaveTarget};
use crate::content::block_types::limits;
use crate::error::{AppError, AppResult};
use crate::models::block_content::{
    AccordionItem, Alignment, FontSize, FontStyle, FontWeight, ImageLayout, MediaImage,
    PollQuestion, StorySection, TextDecoration, TimelineEvent,
};
use crate::models::{Block, BlockContent, BlockPatch, BlockType};
use crate::store::BlockStore;

/// A single field-level edit.
///
/// Paths are dotted, with numeric segments indexing lists:
/// `sections.1.heading`, `questions.0.options.2`, `url.0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BlockEdit {
    SetText { field: String, value: String },
    SetFlag { field: String, value: bool },
    AddItem { list: String },
    RemoveItem { list: String, index: usize },
    MoveItem { list: String, from: usize, to: usize },
}

impl BlockEdit {
    pub fn set_text(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::SetText {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::SetText { field, .. } | Self::SetFlag { field, .. } => field,
            Self::AddItem { list }
            | Self::RemoveItem { list, .. }
            | Self::MoveItem { list, .. } => list,
        }
    }
}

/// Bounds and blank entry for an editable list.
struct ListSpec {
    min: usize,
    max: usize,
    item: Value,
}

fn blank<T: Serialize + Default>() -> Value {
    serde_json::to_value(T::default()).unwrap_or(Value::Null)
}

/// The editable lists of each block type, keyed by path pattern.
fn list_spec(block_type: BlockType, pattern: &str) -> Option<ListSpec> {
    let spec = |min, max, item| Some(ListSpec { min, max, item });
    match (block_type, pattern) {
        (BlockType::Storytelling, "images") => spec(0, limits::IMAGES, blank::<MediaImage>()),
        (BlockType::Storytelling, "sections") => {
            spec(0, limits::SECTIONS, blank::<StorySection>())
        }
        (BlockType::MultiQuestionPoll, "questions") => spec(
            1,
            limits::QUESTIONS,
            serde_json::to_value(PollQuestion {
                question: String::new(),
                options: vec![String::new(); limits::MIN_OPTIONS],
            })
            .unwrap_or(Value::Null),
        ),
        (BlockType::MultiQuestionPoll, "questions.*.options") => spec(
            limits::MIN_OPTIONS,
            limits::OPTIONS,
            Value::String(String::new()),
        ),
        (BlockType::Image, "url") => spec(0, limits::IMAGES, Value::String(String::new())),
        (BlockType::Accordion, "items") => {
            spec(0, limits::ACCORDION_ITEMS, blank::<AccordionItem>())
        }
        (BlockType::Timeline, "events") => {
            spec(0, limits::TIMELINE_EVENTS, blank::<TimelineEvent>())
        }
        _ => None,
    }
}

/// Replace numeric path segments with `*`.
fn pattern_of(path: &str) -> String {
    path.split('.')
        .map(|s| if s.parse::<usize>().is_ok() { "*" } else { s })
        .collect::<Vec<_>>()
        .join(".")
}

fn resolve_mut<'a>(root: &'a mut Value, path: &str) -> AppResult<&'a mut Value> {
    if path.is_empty() || path.split('.').any(str::is_empty) {
        return Err(AppError::validation(format!("invalid field path '{path}'")));
    }
    let pointer = format!("/{}", path.replace('.', "/"));
    root.pointer_mut(&pointer)
        .ok_or_else(|| AppError::validation(format!("unknown field '{path}'")))
}

fn list_mut<'a>(root: &'a mut Value, path: &str) -> AppResult<&'a mut Vec<Value>> {
    resolve_mut(root, path)?
        .as_array_mut()
        .ok_or_else(|| AppError::validation(format!("'{path}' is not a list")))
}

fn check_index(path: &str, index: usize, len: usize) -> AppResult<()> {
    if index < len {
        Ok(())
    } else {
        Err(AppError::validation(format!(
            "'{path}' has no entry {index} (length {len})"
        )))
    }
}

/// Apply one edit to a block's content, returning the new content.
///
/// The input is left untouched when the edit is rejected.
pub fn apply(content: &BlockContent, edit: &BlockEdit) -> AppResult<BlockContent> {
    let block_type = content.block_type();
    let mut content = content.clone();

    // Galleries are edited as lists
    if let BlockContent::Image(image) = &mut content
        && edit.path().split('.').next() == Some("url")
    {
        image.url.promote();
    }

    let mut json = content
        .content_json()
        .map_err(|e| AppError::Internal(e.into()))?;

    match edit {
        BlockEdit::SetText { field, value } => {
            let target = resolve_mut(&mut json, field)?;
            if !target.is_string() {
                return Err(AppError::validation(format!("'{field}' is not a text field")));
            }
            *target = Value::String(value.clone());
        }
        BlockEdit::SetFlag { field, value } => {
            let target = resolve_mut(&mut json, field)?;
            if !target.is_boolean() {
                return Err(AppError::validation(format!("'{field}' is not a toggle")));
            }
            *target = Value::Bool(*value);
        }
        BlockEdit::AddItem { list } => {
            let spec = list_spec(block_type, &pattern_of(list))
                .ok_or_else(|| AppError::validation(format!("'{list}' is not an editable list")))?;
            let items = list_mut(&mut json, list)?;
            if items.len() >= spec.max {
                return Err(AppError::validation(format!(
                    "'{list}' already has the maximum of {} entries",
                    spec.max
                )));
            }
            items.push(spec.item);
        }
        BlockEdit::RemoveItem { list, index } => {
            let spec = list_spec(block_type, &pattern_of(list))
                .ok_or_else(|| AppError::validation(format!("'{list}' is not an editable list")))?;
            let items = list_mut(&mut json, list)?;
            check_index(list, *index, items.len())?;
            if items.len() <= spec.min {
                return Err(AppError::validation(format!(
                    "'{list}' needs at least {} entries",
                    spec.min
                )));
            }
            items.remove(*index);
        }
        BlockEdit::MoveItem { list, from, to } => {
            if list_spec(block_type, &pattern_of(list)).is_none() {
                return Err(AppError::validation(format!("'{list}' is not an editable list")));
            }
            let items = list_mut(&mut json, list)?;
            check_index(list, *from, items.len())?;
            check_index(list, *to, items.len())?;
            let item = items.remove(*from);
            items.insert(*to, item);
        }
    }

    BlockContent::from_parts(block_type, json)
        .map_err(|e| AppError::validation(format!("{block_type}: {e}")))
}

/// Widget used to edit a form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    TextArea { rows: u32 },
    Url,
    Toggle,
    Select { options: &'static [&'static str] },
    /// An editable list; `children` holds one entry per item.
    List { min_items: usize, max_items: usize },
    /// A group of fields belonging to one list item.
    Group,
}

/// One field of a block's editing form.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    /// Dotted edit path.
    pub name: String,
    pub label: String,
    #[serde(flatten)]
    pub kind: FieldKind,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub value: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FormField>,
}

impl FormField {
    fn new(kind: FieldKind, name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            kind,
            required: false,
            max_length: None,
            value: Value::Null,
            children: Vec::new(),
        }
    }

    pub fn text(name: impl Into<String>, label: &str, value: &str, max: usize) -> Self {
        Self::new(FieldKind::Text, name, label)
            .value(value)
            .max_length(max)
    }

    pub fn textarea(name: impl Into<String>, label: &str, value: &str, max: usize) -> Self {
        Self::new(FieldKind::TextArea { rows: 4 }, name, label)
            .value(value)
            .max_length(max)
    }

    pub fn url(name: impl Into<String>, label: &str, value: &str) -> Self {
        Self::new(FieldKind::Url, name, label).value(value)
    }

    pub fn toggle(name: impl Into<String>, label: &str, value: bool) -> Self {
        Self::new(FieldKind::Toggle, name, label).value(value)
    }

    pub fn select(
        name: impl Into<String>,
        label: &str,
        options: &'static [&'static str],
        value: &str,
    ) -> Self {
        Self::new(FieldKind::Select { options }, name, label).value(value)
    }

    pub fn list(
        name: impl Into<String>,
        label: &str,
        min_items: usize,
        max_items: usize,
        children: Vec<FormField>,
    ) -> Self {
        let mut field = Self::new(
            FieldKind::List {
                min_items,
                max_items,
            },
            name,
            label,
        );
        field.children = children;
        field
    }

    pub fn group(name: impl Into<String>, label: String, children: Vec<FormField>) -> Self {
        let mut field = Self::new(FieldKind::Group, name, label);
        field.children = children;
        field
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = value.into();
        self
    }

    /// Find a field by path anywhere in this subtree.
    pub fn find(&self, name: &str) -> Option<&FormField> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }
}

fn image_fields(prefix: &str, image: &MediaImage, url_required: bool) -> Vec<FormField> {
    let url = FormField::url(format!("{prefix}.url"), "Image URL", &image.url);
    vec![
        if url_required { url.required() } else { url },
        FormField::text(format!("{prefix}.alt"), "Alt text", &image.alt, limits::ALT),
        FormField::text(
            format!("{prefix}.caption"),
            "Caption",
            &image.caption,
            limits::CAPTION,
        ),
    ]
}

/// Build the editing form for a block's content.
pub fn form(content: &BlockContent) -> Vec<FormField> {
    match content {
        BlockContent::Storytelling(c) => vec![
            FormField::text("title", "Title", &c.title, limits::TITLE).required(),
            FormField::textarea("description", "Description", &c.description, limits::BODY),
            FormField::list(
                "images",
                "Images",
                0,
                limits::IMAGES,
                c.images
                    .iter()
                    .enumerate()
                    .map(|(i, image)| {
                        let path = format!("images.{i}");
                        let children = image_fields(&path, image, true);
                        FormField::group(path, format!("Image {}", i + 1), children)
                    })
                    .collect(),
            ),
            FormField::list(
                "sections",
                "Sections",
                0,
                limits::SECTIONS,
                c.sections
                    .iter()
                    .enumerate()
                    .map(|(i, s)| {
                        let path = format!("sections.{i}");
                        FormField::group(
                            path.clone(),
                            format!("Section {}", i + 1),
                            vec![
                                FormField::text(
                                    format!("{path}.heading"),
                                    "Heading",
                                    &s.heading,
                                    limits::TITLE,
                                ),
                                FormField::textarea(
                                    format!("{path}.text"),
                                    "Text",
                                    &s.text,
                                    limits::BODY,
                                ),
                                FormField::url(format!("{path}.image"), "Image URL", &s.image),
                            ],
                        )
                    })
                    .collect(),
            ),
        ],
        BlockContent::MultiQuestionPoll(c) => vec![
            FormField::list(
                "questions",
                "Questions",
                1,
                limits::QUESTIONS,
                c.questions
                    .iter()
                    .enumerate()
                    .map(|(i, q)| {
                        let path = format!("questions.{i}");
                        let options = q
                            .options
                            .iter()
                            .enumerate()
                            .map(|(j, option)| {
                                FormField::text(
                                    format!("{path}.options.{j}"),
                                    &format!("Option {}", j + 1),
                                    option,
                                    limits::OPTION,
                                )
                                .required()
                            })
                            .collect();
                        FormField::group(
                            path.clone(),
                            format!("Question {}", i + 1),
                            vec![
                                FormField::text(
                                    format!("{path}.question"),
                                    "Question",
                                    &q.question,
                                    limits::QUESTION,
                                )
                                .required(),
                                FormField::list(
                                    format!("{path}.options"),
                                    "Options",
                                    limits::MIN_OPTIONS,
                                    limits::OPTIONS,
                                    options,
                                ),
                            ],
                        )
                    })
                    .collect(),
            ),
            FormField::textarea(
                "completionMessage",
                "Completion message",
                &c.completion_message,
                limits::CAPTION,
            ),
        ],
        BlockContent::ImageText(c) => {
            let mut fields = vec![FormField::select(
                "layout",
                "Layout",
                ImageLayout::OPTIONS,
                c.layout.as_str(),
            )];
            fields.extend(image_fields("image", &c.image, true));
            fields.push(FormField::text(
                "text.heading",
                "Heading",
                &c.text.heading,
                limits::TITLE,
            ));
            fields.push(
                FormField::textarea("text.content", "Text", &c.text.content, limits::BODY)
                    .required(),
            );
            fields
        }
        BlockContent::Text(c) => vec![
            FormField::text("heading", "Heading", &c.heading, limits::TITLE),
            FormField::textarea("text", "Text", &c.text, limits::BODY).required(),
            FormField::select(
                "alignment",
                "Alignment",
                Alignment::OPTIONS,
                c.alignment.as_str(),
            ),
            FormField::select(
                "fontSize",
                "Font size",
                FontSize::OPTIONS,
                c.font_size.as_str(),
            ),
            FormField::select(
                "fontWeight",
                "Font weight",
                FontWeight::OPTIONS,
                c.font_weight.as_str(),
            ),
            FormField::select(
                "fontStyle",
                "Font style",
                FontStyle::OPTIONS,
                c.font_style.as_str(),
            ),
            FormField::select(
                "textDecoration",
                "Text decoration",
                TextDecoration::OPTIONS,
                c.text_decoration.as_str(),
            ),
        ],
        BlockContent::Image(c) => vec![
            FormField::list(
                "url",
                "Images",
                1,
                limits::IMAGES,
                c.url
                    .entries()
                    .into_iter()
                    .enumerate()
                    .map(|(i, url)| {
                        FormField::url(format!("url.{i}"), &format!("Image {}", i + 1), url)
                            .required()
                    })
                    .collect(),
            ),
            FormField::text("alt", "Alt text", &c.alt, limits::ALT),
            FormField::text("caption", "Caption", &c.caption, limits::CAPTION),
            FormField::select(
                "alignment",
                "Alignment",
                Alignment::OPTIONS,
                c.alignment.as_str(),
            ),
        ],
        BlockContent::Video(c) => vec![
            FormField::url("url", "Video URL", &c.url).required(),
            FormField::text("title", "Title", &c.title, limits::TITLE),
            FormField::textarea(
                "description",
                "Description",
                &c.description,
                limits::SHORT_BODY,
            ),
            FormField::toggle("autoplay", "Autoplay", c.autoplay),
            FormField::toggle("loop", "Loop", c.looped),
        ],
        BlockContent::Accordion(c) => vec![
            FormField::text("title", "Title", &c.title, limits::TITLE),
            FormField::list(
                "items",
                "Items",
                1,
                limits::ACCORDION_ITEMS,
                c.items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        let path = format!("items.{i}");
                        FormField::group(
                            path.clone(),
                            format!("Item {}", i + 1),
                            vec![
                                FormField::text(
                                    format!("{path}.title"),
                                    "Title",
                                    &item.title,
                                    limits::TITLE,
                                )
                                .required(),
                                FormField::textarea(
                                    format!("{path}.content"),
                                    "Content",
                                    &item.content,
                                    limits::BODY,
                                ),
                            ],
                        )
                    })
                    .collect(),
            ),
        ],
        BlockContent::Timeline(c) => vec![
            FormField::text("title", "Title", &c.title, limits::TITLE),
            FormField::list(
                "events",
                "Events",
                1,
                limits::TIMELINE_EVENTS,
                c.events
                    .iter()
                    .enumerate()
                    .map(|(i, event)| {
                        let path = format!("events.{i}");
                        FormField::group(
                            path.clone(),
                            format!("Event {}", i + 1),
                            vec![
                                FormField::text(
                                    format!("{path}.date"),
                                    "Date",
                                    &event.date,
                                    limits::DATE,
                                )
                                .required(),
                                FormField::text(
                                    format!("{path}.title"),
                                    "Title",
                                    &event.title,
                                    limits::TITLE,
                                )
                                .required(),
                                FormField::textarea(
                                    format!("{path}.description"),
                                    "Description",
                                    &event.description,
                                    limits::SHORT_BODY,
                                ),
                            ],
                        )
                    })
                    .collect(),
            ),
        ],
    }
}

/// Persists a block's content through a `BlockStore`.
pub struct BlockSaveTarget {
    store: Arc<dyn BlockStore>,
    document_id: Uuid,
    block_id: Uuid,
}

impl BlockSaveTarget {
    pub fn new(store: Arc<dyn BlockStore>, document_id: Uuid, block_id: Uuid) -> Self {
        Self {
            store,
            document_id,
            block_id,
        }
    }
}

#[async_trait]
impl SaveTarget for BlockSaveTarget {
    type Value = BlockContent;
    type Output = Block;

    async fn save(&self, value: BlockContent) -> AppResult<Block> {
        self.store
            .update(self.document_id, self.block_id, BlockPatch::content(value))
            .await
    }
}

/// Final state of a closed editor.
#[derive(Debug)]
pub struct EditorClosed {
    /// The most recent canonical block.
    pub block: Block,
    pub status: SaveStatus,
}

/// An open block: local content plus its auto-save driver.
pub struct BlockEditor {
    block: Block,
    content: BlockContent,
    saver: AutoSaver<BlockSaveTarget>,
}

impl BlockEditor {
    /// Open a block for editing. Must be called inside a tokio runtime.
    pub fn open(store: Arc<dyn BlockStore>, block: Block, settings: AutoSaveSettings) -> Self {
        let target = Arc::new(BlockSaveTarget::new(store, block.document_id, block.id));
        let saver = AutoSaver::spawn(target, block.content.clone(), settings);
        Self {
            content: block.content.clone(),
            block,
            saver,
        }
    }

    /// The last canonical block seen from the store.
    pub fn block(&self) -> &Block {
        &self.block
    }

    /// Local content, including unsaved edits.
    pub fn content(&self) -> &BlockContent {
        &self.content
    }

    pub fn form(&self) -> Vec<FormField> {
        form(&self.content)
    }

    /// Apply an edit locally and schedule it for saving.
    pub fn edit(&mut self, edit: &BlockEdit) -> AppResult<&BlockContent> {
        self.content = apply(&self.content, edit)?;
        self.saver.change(self.content.clone());
        Ok(&self.content)
    }

    /// Replace the whole content, keeping the block type.
    pub fn replace(&mut self, content: BlockContent) -> AppResult<()> {
        if content.block_type() != self.content.block_type() {
            return Err(AppError::validation(format!(
                "block type cannot change from {} to {}",
                self.content.block_type(),
                content.block_type()
            )));
        }
        self.content = content;
        self.saver.change(self.content.clone());
        Ok(())
    }

    /// Offer a block fetched from elsewhere. Ignored while the user is typing
    /// or has unsaved edits.
    pub async fn external_update(&mut self, block: Block) -> bool {
        if block.id != self.block.id {
            return false;
        }
        let applied = self.saver.offer_external(block.content.clone()).await;
        if applied {
            self.content = block.content.clone();
            self.block = block;
        }
        applied
    }

    pub fn status(&self) -> SaveStatus {
        self.saver.status()
    }

    pub fn retry(&self) {
        self.saver.retry();
    }

    /// Drain completed saves. Returns the newest canonical block, if any.
    pub fn take_saved(&mut self) -> Option<Block> {
        let mut latest = None;
        while let Some(block) = self.saver.try_saved() {
            latest = Some(block);
        }
        if let Some(block) = &latest {
            self.block = block.clone();
        }
        latest
    }

    /// Flush pending edits and stop the saver.
    pub async fn close(self) -> AppResult<EditorClosed> {
        let closed = self.saver.close().await?;
        Ok(EditorClosed {
            block: closed.saved.into_iter().last().unwrap_or(self.block),
            status: closed.status,
        })
    }
}
