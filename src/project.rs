use serde::{Deserialize, Serialize};

pub const DEFAULT_MARKUP: &str = "<!-- HTML generated code will appear here --> <h1>Preview for html, css, and javascript code</h1>";
pub const DEFAULT_STYLE: &str = "/* Css styles will be applied from here */";
pub const DEFAULT_SCRIPT: &str = "//Javascript code will appear here";

/// The three editable buffers of a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    #[serde(rename = "html")]
    pub markup: String,
    #[serde(rename = "css")]
    pub style: String,
    #[serde(rename = "js")]
    pub script: String,
}

impl Project {
    pub fn new(
        markup: impl Into<String>,
        style: impl Into<String>,
        script: impl Into<String>,
    ) -> Self {
        Self {
            markup: markup.into(),
            style: style.into(),
            script: script.into(),
        }
    }

    pub fn buffer(&self, kind: BufferKind) -> &str {
        match kind {
            BufferKind::Markup => &self.markup,
            BufferKind::Style => &self.style,
            BufferKind::Script => &self.script,
        }
    }

    pub fn buffer_mut(&mut self, kind: BufferKind) -> &mut String {
        match kind {
            BufferKind::Markup => &mut self.markup,
            BufferKind::Style => &mut self.style,
            BufferKind::Script => &mut self.script,
        }
    }
}

impl Default for Project {
    fn default() -> Self {
        Self::new(DEFAULT_MARKUP, DEFAULT_STYLE, DEFAULT_SCRIPT)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Markup,
    Style,
    Script,
}

impl BufferKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Markup => "HTML",
            Self::Style => "CSS",
            Self::Script => "JS",
        }
    }

    pub fn language(self) -> &'static str {
        match self {
            Self::Markup => "html",
            Self::Style => "css",
            Self::Script => "javascript",
        }
    }
}
