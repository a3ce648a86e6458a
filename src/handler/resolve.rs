//! URL path to filesystem resolution
//!
//! Maps a request path onto the root directory, enforcing containment and
//! applying the index file, directory listing and SPA fallback rules.

use percent_encoding::percent_decode_str;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;

use crate::config::ValidConfig;
use crate::logger;

pub const INDEX_FILE: &str = "index.html";

/// What a request path refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedEntity {
    RegularFile {
        path: PathBuf,
        size: u64,
        modified: Option<SystemTime>,
    },
    /// A directory without an index file
    Directory { path: PathBuf, listable: bool },
    NotFound,
    Forbidden,
}

pub struct PathResolver {
    root: PathBuf,
    directory_listing: bool,
    spa_fallback: Option<PathBuf>,
}

enum Lookup {
    Found(PathBuf),
    Missing,
    Forbidden,
}

impl PathResolver {
    pub fn new(config: &ValidConfig) -> Self {
        let spa = &config.features.spa;
        Self {
            root: config.root().to_path_buf(),
            directory_listing: config.features.directory_listing,
            spa_fallback: spa
                .enabled
                .then(|| PathBuf::from(spa.fallback_file.trim_start_matches('/'))),
        }
    }

    /// Resolve a raw (still percent-encoded) URL path.
    ///
    /// Traversal is checked on the decoded path before touching the
    /// filesystem, so it yields `Forbidden` whatever the listing and SPA
    /// settings are.
    pub async fn resolve(&self, url_path: &str) -> ResolvedEntity {
        let Some(relative) = decode_relative(url_path) else {
            logger::log_debug(&format!("Rejected request path: {url_path}"));
            return ResolvedEntity::Forbidden;
        };

        let target = match self.lookup(&relative).await {
            Lookup::Found(target) => target,
            Lookup::Forbidden => return ResolvedEntity::Forbidden,
            Lookup::Missing => return self.fallback().await,
        };

        let Ok(meta) = fs::metadata(&target).await else {
            return self.fallback().await;
        };

        if meta.is_dir() {
            if let Lookup::Found(index) = self.lookup(&relative.join(INDEX_FILE)).await {
                if let Some(entity) = file_entity(index).await {
                    return entity;
                }
            }
            return ResolvedEntity::Directory {
                path: target,
                listable: self.directory_listing,
            };
        }

        if meta.is_file() {
            return ResolvedEntity::RegularFile {
                path: target,
                size: meta.len(),
                modified: meta.modified().ok(),
            };
        }

        // Sockets, FIFOs and devices are never served
        ResolvedEntity::NotFound
    }

    /// Canonicalize `relative` under the root and verify containment
    async fn lookup(&self, relative: &Path) -> Lookup {
        match fs::canonicalize(self.root.join(relative)).await {
            Ok(target) if target.starts_with(&self.root) => Lookup::Found(target),
            Ok(target) => {
                logger::log_warning(&format!(
                    "Symlink escape blocked: {} -> {}",
                    relative.display(),
                    target.display()
                ));
                Lookup::Forbidden
            }
            Err(e) if e.kind() == ErrorKind::PermissionDenied => Lookup::Forbidden,
            Err(_) => Lookup::Missing,
        }
    }

    /// Nothing exists at the path: SPA entry page or 404
    async fn fallback(&self) -> ResolvedEntity {
        let Some(fallback) = &self.spa_fallback else {
            return ResolvedEntity::NotFound;
        };
        match self.lookup(fallback).await {
            Lookup::Found(path) => file_entity(path)
                .await
                .unwrap_or(ResolvedEntity::NotFound),
            Lookup::Missing | Lookup::Forbidden => {
                logger::log_warning(&format!(
                    "SPA fallback file not available: {}",
                    fallback.display()
                ));
                ResolvedEntity::NotFound
            }
        }
    }
}

async fn file_entity(path: PathBuf) -> Option<ResolvedEntity> {
    let meta = fs::metadata(&path).await.ok().filter(|m| m.is_file())?;
    Some(ResolvedEntity::RegularFile {
        size: meta.len(),
        modified: meta.modified().ok(),
        path,
    })
}

/// Percent-decode a URL path into a root-relative path.
///
/// Returns `None` for undecodable input, NUL bytes and any `..` segment,
/// whether separated by `/` or `\`.
pub fn decode_relative(url_path: &str) -> Option<PathBuf> {
    let decoded = percent_decode_str(url_path).decode_utf8().ok()?;
    if decoded.contains('\0') {
        return None;
    }
    if decoded.split(['/', '\\']).any(|segment| segment == "..") {
        return None;
    }

    let relative = PathBuf::from(decoded.trim_start_matches('/'));
    relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        .then_some(relative)
}
