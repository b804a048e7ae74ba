use crate::project::Project;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const MARKUP_FILE: &str = "index.html";
pub const STYLE_FILE: &str = "styles.css";
pub const SCRIPT_FILE: &str = "script.js";
pub const ARCHIVE_FILE: &str = "project.tar";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    EmbeddedDocument,
    Markup,
    Style,
    Script,
    Archive,
}

impl ExportKind {
    pub const ALL: [ExportKind; 5] = [
        Self::EmbeddedDocument,
        Self::Markup,
        Self::Style,
        Self::Script,
        Self::Archive,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::EmbeddedDocument => "HTML with CSS and JavaScript embedded",
            Self::Markup => "HTML (.html)",
            Self::Style => "CSS (.css)",
            Self::Script => "JavaScript (.js)",
            Self::Archive => "Archive (all files)",
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            Self::EmbeddedDocument | Self::Markup => MARKUP_FILE,
            Self::Style => STYLE_FILE,
            Self::Script => SCRIPT_FILE,
            Self::Archive => ARCHIVE_FILE,
        }
    }
}

/// Single page with the stylesheet in `<head>` and the script at the end of
/// `<body>`.
pub fn embedded_document(project: &Project) -> String {
    format!(
        "<html>\n\t<head>\n\t\t<style>{}</style>\n\t</head>\n\t<body>\n\t\t{}\n\t\t<script>{}</script>\n\t</body>\n</html>\n",
        project.style, project.markup, project.script
    )
}

/// The three buffers as standalone files, in archive order.
pub fn artifacts(project: &Project) -> [(&'static str, &str); 3] {
    [
        (MARKUP_FILE, project.markup.as_str()),
        (STYLE_FILE, project.style.as_str()),
        (SCRIPT_FILE, project.script.as_str()),
    ]
}

pub fn archive(project: &Project) -> io::Result<Vec<u8>> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, contents) in artifacts(project) {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_path(name)?;
        header.set_mode(0o644);
        header.set_mtime(0);
        header.set_size(contents.len() as u64);
        header.set_cksum();
        builder.append(&header, contents.as_bytes())?;
    }
    builder.into_inner()
}

pub fn render(kind: ExportKind, project: &Project) -> io::Result<Vec<u8>> {
    Ok(match kind {
        ExportKind::EmbeddedDocument => embedded_document(project).into_bytes(),
        ExportKind::Markup => project.markup.clone().into_bytes(),
        ExportKind::Style => project.style.clone().into_bytes(),
        ExportKind::Script => project.script.clone().into_bytes(),
        ExportKind::Archive => archive(project)?,
    })
}

pub fn write_export(dir: &Path, kind: ExportKind, project: &Project) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(kind.file_name());
    fs::write(&path, render(kind, project)?)?;
    tracing::info!(path = %path.display(), ?kind, "project exported");
    Ok(path)
}
