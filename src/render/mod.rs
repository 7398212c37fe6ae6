// src/render/mod.rs
//! Turns selected content into the newsletter HTML and subject line.

pub mod catalog;
pub mod subject;

use handlebars::Handlebars;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Instant;

use crate::content::ContentItem;
use crate::error::DispatchError;
use crate::window::Frequency;

pub use catalog::{TemplateCatalog, TemplateKind, TemplateSource, DEFAULT_TEMPLATE};
pub use subject::{DynamicCriterion, SubjectConfig, SubjectMode};

pub const IMAGE_SIZE: &str = "100%";

#[derive(Debug, Clone, Serialize)]
pub struct SiteInfo {
    pub name: String,
    pub url: String,
    /// Public base URL templates' static assets are served from.
    pub templates_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedNewsletter {
    pub subject: String,
    pub html: String,
    pub template: String,
}

/// `<img>` for the lead image, empty when the item has none.
pub fn image_tag(item: &ContentItem) -> String {
    match item.lead_image.as_deref() {
        Some(src) => format!(
            r#"<img src="{}" alt="{}" width="{IMAGE_SIZE}" style="display:block;max-width:100%;" />"#,
            html_escape::encode_double_quoted_attribute(src),
            html_escape::encode_double_quoted_attribute(&item.title),
        ),
        None => String::new(),
    }
}

fn post_context(item: &ContentItem) -> Value {
    json!({
        "ID": item.id,
        "title": item.title,
        "content": item.body,
        "link": item.permalink,
        "excerpt": item.excerpt,
        "truncate_content": item.truncated_body,
        "date": item.published_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        "post_image": image_tag(item),
        "post_image_size": IMAGE_SIZE,
    })
}

pub struct TemplateRenderer {
    catalog: TemplateCatalog,
    site: SiteInfo,
}

impl TemplateRenderer {
    pub fn new(catalog: TemplateCatalog, site: SiteInfo) -> Self {
        Self { catalog, site }
    }

    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    pub fn site(&self) -> &SiteInfo {
        &self.site
    }

    /// Subject and body for `items` using the already resolved template name.
    pub fn render(
        &self,
        items: &[ContentItem],
        template: &str,
        subject: &SubjectConfig,
        frequency: Frequency,
    ) -> Result<RenderedNewsletter, DispatchError> {
        let started = Instant::now();
        let source = self.catalog.load(template)?;
        let html = self.render_body(&source, items)?;
        crate::metrics::record_render_ms(started.elapsed().as_secs_f64() * 1000.0);
        Ok(RenderedNewsletter {
            subject: subject.resolve(items, frequency),
            html,
            template: source.name,
        })
    }

    fn render_body(
        &self,
        source: &TemplateSource,
        items: &[ContentItem],
    ) -> Result<String, DispatchError> {
        let mut hb = Handlebars::new();
        hb.register_escape_fn(handlebars::no_escape);
        let posts: Vec<Value> = items.iter().map(post_context).collect();

        let mut ctx = json!({
            "header_title": self.site.name,
            "site_link": self.site.url,
            "templateURL": format!(
                "{}/{}/",
                self.site.templates_url.trim_end_matches('/'),
                source.name
            ),
            "posts": posts,
        });

        if source.kind == TemplateKind::FlatHtml {
            let fragment = source.item.as_deref().ok_or_else(|| {
                DispatchError::Rendering(format!("flat template '{}' has no item fragment", source.name))
            })?;
            let mut list = String::new();
            for (item, post) in items.iter().zip(&posts) {
                let item_ctx = json!({
                    "post": post,
                    "post_image": image_tag(item),
                    "postImage": image_tag(item),
                    "titleURL": item.permalink,
                    "title": item.title,
                    "content": item.excerpt,
                });
                list.push_str(&render_str(&hb, fragment, &item_ctx)?);
            }
            ctx["list"] = Value::String(list);
        }

        let html = render_str(&hb, &source.main, &ctx)?;
        if html.trim().is_empty() {
            return Err(DispatchError::Rendering(format!(
                "template '{}' produced an empty body",
                source.name
            )));
        }
        Ok(html)
    }
}

fn render_str(hb: &Handlebars<'_>, template: &str, ctx: &Value) -> Result<String, DispatchError> {
    hb.render_template(template, ctx)
        .map_err(|e| DispatchError::Rendering(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::fs;
    use std::path::PathBuf;

    fn item(id: u64, title: &str, image: Option<&str>) -> ContentItem {
        ContentItem {
            id,
            title: title.into(),
            body: "<p>body</p>".into(),
            excerpt: format!("excerpt {id}"),
            truncated_body: "body".into(),
            permalink: format!("https://site/{id}"),
            published_at: NaiveDate::from_ymd_opt(2024, 3, 15)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            lead_image: image.map(str::to_string),
        }
    }

    fn renderer(root: PathBuf) -> TemplateRenderer {
        TemplateRenderer::new(
            TemplateCatalog::new(vec![root]),
            SiteInfo {
                name: "My Blog".into(),
                url: "https://site".into(),
                templates_url: "https://site/templates/".into(),
            },
        )
    }

    #[test]
    fn flat_template_concatenates_item_fragments() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("default");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("template.html"), "<h1>{{header_title}}</h1>{{list}}").unwrap();
        fs::write(
            dir.join("list.html"),
            r#"<a href="{{titleURL}}">{{title}}</a>{{post_image}}<p>{{content}}</p>"#,
        )
        .unwrap();

        let r = renderer(tmp.path().to_path_buf());
        let out = r
            .render(
                &[item(1, "A & B", Some("https://img/1.png")), item(2, "C", None)],
                "default",
                &SubjectConfig::fixed("Hi"),
                Frequency::Daily,
            )
            .unwrap();
        assert_eq!(out.subject, "Hi");
        assert!(out.html.starts_with("<h1>My Blog</h1>"));
        assert!(out.html.contains(r#"<a href="https://site/1">A & B</a><img src="https://img/1.png""#));
        assert!(out.html.contains(r#"<a href="https://site/2">C</a><p>excerpt 2</p>"#));
    }

    #[test]
    fn structured_template_iterates_posts() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("digest");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("template.hbs"),
            "{{templateURL}}|{{#each posts}}[{{ID}}:{{title}}:{{post_image_size}}]{{/each}}",
        )
        .unwrap();
        let out = renderer(tmp.path().to_path_buf())
            .render(
                &[item(1, "A", None), item(2, "B", None)],
                "digest",
                &SubjectConfig::default(),
                Frequency::Weekly,
            )
            .unwrap();
        assert_eq!(out.html, "https://site/templates/digest/|[1:A:100%][2:B:100%]");
        assert_eq!(out.subject, "Weekly mail");
    }

    #[test]
    fn blank_output_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("default");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("template.html"), "  {{list}} ").unwrap();
        fs::write(dir.join("list.html"), "").unwrap();
        let err = renderer(tmp.path().to_path_buf())
            .render(&[], "default", &SubjectConfig::default(), Frequency::Daily)
            .unwrap_err();
        assert!(matches!(err, DispatchError::Rendering(_)));
    }

    #[test]
    fn image_tag_degrades_to_empty() {
        assert_eq!(image_tag(&item(1, "x", None)), "");
        assert!(image_tag(&item(1, "x", Some("a.png"))).contains(r#"src="a.png""#));
    }
}
