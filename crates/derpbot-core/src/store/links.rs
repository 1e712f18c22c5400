use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Mutex,
};

use crate::{errors::Error, store::write_atomic, Result};

/// Link directory categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LinkCategory {
    WordPress,
    Substack,
    Blogspot,
    Medium,
}

impl LinkCategory {
    pub const ALL: [LinkCategory; 4] = [
        LinkCategory::WordPress,
        LinkCategory::Substack,
        LinkCategory::Blogspot,
        LinkCategory::Medium,
    ];

    /// Name as stored on disk and typed by users.
    pub fn as_str(self) -> &'static str {
        match self {
            LinkCategory::WordPress => "wordpress",
            LinkCategory::Substack => "substack",
            LinkCategory::Blogspot => "blogspot",
            LinkCategory::Medium => "medium",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            LinkCategory::WordPress => "WordPress",
            LinkCategory::Substack => "Substack",
            LinkCategory::Blogspot => "Blogspot",
            LinkCategory::Medium => "Medium",
        }
    }
}

impl FromStr for LinkCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        LinkCategory::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| Error::InvalidArgument(format!("'{wanted}' is not a valid category")))
    }
}

impl std::fmt::Display for LinkCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Link {
    pub category: LinkCategory,
    pub title: String,
    pub url: String,
}

impl Link {
    /// Validate and build a link. Titles cannot contain commas (the store is comma-separated).
    pub fn new(category: LinkCategory, title: &str, url: &str) -> Result<Self> {
        let title = title.trim();
        let url = url.trim();
        if title.is_empty() || url.is_empty() {
            return Err(Error::InvalidArgument(
                "a link needs both a title and a url".to_string(),
            ));
        }
        if title.contains(',') || title.contains('\n') || url.contains('\n') {
            return Err(Error::InvalidArgument(
                "link titles cannot contain commas or line breaks".to_string(),
            ));
        }
        Ok(Self {
            category,
            title: title.to_string(),
            url: url.to_string(),
        })
    }

    fn to_line(&self) -> String {
        format!("{},{},{}", self.category, self.title, self.url)
    }

    /// Parse `category,title,url`; the url keeps any further commas.
    fn parse_line(line: &str) -> Option<Self> {
        let mut parts = line.trim().splitn(3, ',');
        let category = parts.next()?.parse().ok()?;
        let title = parts.next()?.trim();
        let url = parts.next()?.trim();
        if title.is_empty() || url.is_empty() {
            return None;
        }
        Some(Self {
            category,
            title: title.to_string(),
            url: url.to_string(),
        })
    }

    fn matches(&self, category: LinkCategory, title: &str) -> bool {
        self.category == category && self.title.to_lowercase() == title.trim().to_lowercase()
    }
}

/// Append-only list of links with removal by category + title.
pub trait LinkStore: Send + Sync {
    fn append(&self, link: &Link) -> Result<()>;
    /// Remove every link matching `category` + `title` (case-insensitive).
    /// Returns whether anything was removed.
    fn remove(&self, category: LinkCategory, title: &str) -> Result<bool>;
    fn list(&self, category: LinkCategory) -> Result<Vec<Link>>;
}

/// `links.txt`-backed store, one `category,title,url` per line.
pub struct FileLinkStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileLinkStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_lines(&self) -> Result<Vec<String>> {
        match fs::read_to_string(&self.path) {
            Ok(txt) => Ok(txt.lines().map(str::to_string).collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(Error::Store {
                path: self.path.clone(),
                reason: e.to_string(),
            }),
        }
    }

    fn write_lines(&self, lines: &[String]) -> Result<()> {
        let mut out = lines.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        write_atomic(&self.path, out.as_bytes())
    }
}

impl LinkStore for FileLinkStore {
    fn append(&self, link: &Link) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        let needs_newline = fs::read(&self.path)
            .map(|bytes| !bytes.is_empty() && !bytes.ends_with(b"\n"))
            .unwrap_or(false);

        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        if needs_newline {
            f.write_all(b"\n")?;
        }
        writeln!(f, "{}", link.to_line())?;
        Ok(())
    }

    fn remove(&self, category: LinkCategory, title: &str) -> Result<bool> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        let lines = self.read_lines()?;
        let before = lines.len();
        let kept: Vec<String> = lines
            .into_iter()
            .filter(|line| !Link::parse_line(line).is_some_and(|l| l.matches(category, title)))
            .collect();
        if kept.len() == before {
            return Ok(false);
        }
        self.write_lines(&kept)?;
        Ok(true)
    }

    fn list(&self, category: LinkCategory) -> Result<Vec<Link>> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        Ok(self
            .read_lines()?
            .iter()
            .filter_map(|line| Link::parse_line(line))
            .filter(|link| link.category == category)
            .collect())
    }
}
