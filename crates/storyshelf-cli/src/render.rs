//! Text rendering for CLI output.

use colored::Colorize;
use std::fmt::Write as _;
use storyshelf_graph::{Category, ExtendedTag, Tag, TagGraph, TagId, TagWithCategory};

pub fn category_line(category: &Category, tag_count: usize) -> String {
    let (r, g, b) = category.color.components();
    format!(
        "{:>4}  {}  {}  order {}  ({} tags)",
        category.id,
        category.name.bold(),
        category.color.to_string().truecolor(r, g, b),
        category.sort_order,
        tag_count
    )
}

pub fn tag_line(graph: &TagGraph, tag: &Tag) -> String {
    let category = graph
        .category(tag.category)
        .map(|c| c.name.as_str())
        .unwrap_or("?");
    let mut line = format!("{:>4}  {}  [{}]", tag.id, tag.name.bold(), category.cyan());
    if !tag.implies.is_empty() {
        let _ = write!(line, "  implies {}", id_list(tag.implies.iter().copied()));
    }
    line
}

pub fn id_list(ids: impl Iterator<Item = TagId>) -> String {
    let ids: Vec<String> = ids.map(|id| id.to_string()).collect();
    if ids.is_empty() {
        "nothing".to_string()
    } else {
        ids.join(", ")
    }
}

pub fn extended_tag(ext: &ExtendedTag) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {}  [{}]",
        ext.tag.id,
        ext.tag.name.bold(),
        ext.category.name.cyan()
    );
    if let Some(description) = &ext.tag.description {
        let _ = writeln!(out, "  {}", description.dimmed());
    }
    section(&mut out, "implies", &ext.implied);
    section(&mut out, "indirectly implies", &ext.indirectly_implied);
    section(&mut out, "implied by", &ext.implied_by);
    section(&mut out, "indirectly implied by", &ext.indirectly_implied_by);
    out
}

fn section(out: &mut String, title: &str, tags: &[TagWithCategory]) {
    if tags.is_empty() {
        return;
    }
    let _ = writeln!(out, "  {}:", title.green());
    for t in tags {
        let _ = writeln!(out, "    {:>4}  {}  [{}]", t.tag.id, t.tag.name, t.category.name);
    }
}
