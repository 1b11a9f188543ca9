//! Turning a model reply into a runnable script file.

use anyhow::{Context, Result};
use std::path::Path;

pub const DEFAULT_FILE_NAME: &str = "scraper.py";

/// Prepended to every saved script.
pub const BOILERPLATE: &str = "\
# Generated by scrapewright
from bs4 import BeautifulSoup
import requests

";

/// Code from a reply: the contents of its fenced blocks, or the whole reply
/// when it has no fences.
pub fn extract_code(reply: &str) -> String {
    let is_fence = |line: &str| line.trim_start().starts_with("```");

    if !reply.lines().any(is_fence) {
        return reply.trim().to_string();
    }

    let mut inside = false;
    let mut code = Vec::new();
    for line in reply.lines() {
        if is_fence(line) {
            inside = !inside;
            continue;
        }
        if inside {
            code.push(line);
        }
    }
    code.join("\n").trim().to_string()
}

/// Full file contents for `reply`.
pub fn render(reply: &str) -> String {
    format!("{BOILERPLATE}{}\n", extract_code(reply))
}

pub fn save(path: impl AsRef<Path>, reply: &str) -> Result<()> {
    let path = path.as_ref();
    std::fs::write(path, render(reply)).with_context(|| format!("failed to write {}", path.display()))
}
