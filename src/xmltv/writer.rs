use flate2::Compression;
use flate2::write::GzEncoder;
use quick_xml::escape::escape;
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::errors::AppResult;
use crate::xmltv::model::{Credit, CreditRole, Icon, Programme, Tv, TvChannel, Text};

const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Path of the gzip copy written next to `path`
pub fn archive_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".gz");
    PathBuf::from(name)
}

/// Render the document as pretty-printed UTF-8 XML
pub fn render(tv: &Tv) -> String {
    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");

    xml.push_str("<tv");
    if let Some(location) = &tv.schema_location {
        let _ = write!(
            xml,
            " xmlns:xsi=\"{}\" xsi:noNamespaceSchemaLocation=\"{}\"",
            XSI_NAMESPACE,
            escape(location)
        );
    }
    let _ = writeln!(
        xml,
        " date=\"{}\" generator-info-name=\"{}\" generator-info-url=\"{}\">",
        escape(&tv.date),
        escape(&tv.generator_name),
        escape(&tv.generator_url)
    );

    for channel in &tv.channels {
        render_channel(&mut xml, channel);
    }
    for programme in &tv.programmes {
        render_programme(&mut xml, programme);
    }

    xml.push_str("</tv>\n");
    xml
}

fn render_channel(xml: &mut String, channel: &TvChannel) {
    let _ = writeln!(xml, "  <channel id=\"{}\">", escape(&channel.id));
    let _ = writeln!(
        xml,
        "    <display-name>{}</display-name>",
        escape(&channel.display_name)
    );
    for icon in &channel.icons {
        render_icon(xml, "    ", icon);
    }
    xml.push_str("  </channel>\n");
}

fn render_icon(xml: &mut String, indent: &str, icon: &Icon) {
    let _ = write!(xml, "{}<icon src=\"{}\"", indent, escape(&icon.src));
    if let Some(width) = icon.width {
        let _ = write!(xml, " width=\"{width}\"");
    }
    if let Some(height) = icon.height {
        let _ = write!(xml, " height=\"{height}\"");
    }
    xml.push_str(" />\n");
}

fn render_text(xml: &mut String, tag: &str, text: &Text) {
    match &text.lang {
        Some(lang) => {
            let _ = writeln!(
                xml,
                "    <{tag} lang=\"{}\">{}</{tag}>",
                escape(lang),
                escape(&text.value)
            );
        }
        None => {
            let _ = writeln!(xml, "    <{tag}>{}</{tag}>", escape(&text.value));
        }
    }
}

fn render_credits(xml: &mut String, credits: &[Credit]) {
    if credits.is_empty() {
        return;
    }
    xml.push_str("    <credits>\n");
    for credit in credits {
        let tag = credit.role.tag();
        match (&credit.character, credit.role) {
            (Some(character), CreditRole::Actor) => {
                let _ = writeln!(
                    xml,
                    "      <{tag} role=\"{}\">{}</{tag}>",
                    escape(character),
                    escape(&credit.name)
                );
            }
            _ => {
                let _ = writeln!(xml, "      <{tag}>{}</{tag}>", escape(&credit.name));
            }
        }
    }
    xml.push_str("    </credits>\n");
}

fn render_programme(xml: &mut String, programme: &Programme) {
    let _ = writeln!(
        xml,
        "  <programme start=\"{}\" stop=\"{}\" channel=\"{}\">",
        escape(&programme.start),
        escape(&programme.stop),
        escape(&programme.channel)
    );

    for title in &programme.titles {
        render_text(xml, "title", title);
    }
    for sub_title in &programme.sub_titles {
        render_text(xml, "sub-title", sub_title);
    }
    if let Some(desc) = &programme.desc {
        render_text(xml, "desc", desc);
    }
    render_credits(xml, &programme.credits);
    if let Some(date) = &programme.date {
        let _ = writeln!(xml, "    <date>{}</date>", escape(date));
    }
    for category in &programme.categories {
        render_text(xml, "category", category);
    }
    if let Some(length) = programme.length {
        let _ = writeln!(xml, "    <length units=\"seconds\">{length}</length>");
    }
    for icon in &programme.icons {
        render_icon(xml, "    ", icon);
    }
    for episode in &programme.episode_nums {
        let _ = writeln!(
            xml,
            "    <episode-num system=\"{}\">{}</episode-num>",
            escape(episode.system),
            escape(&episode.value)
        );
    }
    if programme.new {
        xml.push_str("    <new />\n");
    }
    for rating in &programme.ratings {
        render_rating(xml, "rating", rating.system.as_deref(), &rating.value, &rating.icons);
    }
    for star in &programme.star_ratings {
        render_rating(xml, "star-rating", star.system.as_deref(), &star.value, &star.icons);
    }
    if programme.live {
        xml.push_str("    <live />\n");
    }

    xml.push_str("  </programme>\n");
}

fn render_rating(xml: &mut String, tag: &str, system: Option<&str>, value: &str, icons: &[Icon]) {
    match system {
        Some(system) => {
            let _ = writeln!(xml, "    <{tag} system=\"{}\">", escape(system));
        }
        None => {
            let _ = writeln!(xml, "    <{tag}>");
        }
    }
    let _ = writeln!(xml, "      <value>{}</value>", escape(value));
    for icon in icons {
        render_icon(xml, "      ", icon);
    }
    let _ = writeln!(xml, "    </{tag}>");
}

/// Gzip `data` at the default compression level
pub fn gzip(data: &[u8]) -> AppResult<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Write the rendered document to `path`, plus `{path}.gz` when `archive` is set
pub async fn write_guide(tv: &Tv, path: &Path, archive: bool) -> AppResult<Option<PathBuf>> {
    let xml = render(tv);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, xml.as_bytes()).await?;
    info!(
        "Wrote guide with {} channels and {} programmes to {}",
        tv.channels.len(),
        tv.programmes.len(),
        path.display()
    );

    if !archive {
        return Ok(None);
    }

    let archive = archive_path(path);
    tokio::fs::write(&archive, gzip(xml.as_bytes())?).await?;
    info!("Wrote guide archive to {}", archive.display());
    Ok(Some(archive))
}
