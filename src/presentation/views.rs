use crate::application::error::{ErrorReport, HttpError};
use crate::config::SiteSettings;
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(chrome: LayoutChrome) -> Response {
    let view = LayoutContext::new(chrome, "Not found", ErrorPageView::not_found());
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

/// Site-wide values shared by every page.
#[derive(Debug, Clone)]
pub struct LayoutChrome {
    pub site_title: String,
    pub description: String,
}

impl From<&SiteSettings> for LayoutChrome {
    fn from(site: &SiteSettings) -> Self {
        Self {
            site_title: site.title.clone(),
            description: site.description.clone(),
        }
    }
}

pub struct LayoutContext<T> {
    pub site_title: String,
    pub description: String,
    pub page_title: String,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, page_title: impl Into<String>, content: T) -> Self {
        Self {
            site_title: chrome.site_title,
            description: chrome.description,
            page_title: page_title.into(),
            content,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PostCard {
    pub title: String,
    pub href: String,
    pub summary: String,
    pub published: String,
    pub iso_date: String,
}

pub struct PostListContext {
    pub heading: String,
    pub posts: Vec<PostCard>,
    /// Set on the home page when older posts exist beyond the recent list.
    pub show_archive_link: bool,
}

pub struct PostDetailContext {
    pub title: String,
    pub summary: String,
    /// Stored HTML, rendered without escaping.
    pub body_html: String,
    pub published: String,
    pub iso_date: String,
    /// Empty unless the post was edited after its publication day.
    pub updated: String,
}

pub struct AboutContext {
    pub description: String,
}

pub struct ErrorPageView {
    pub title: String,
    pub message: String,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            title: "Page Not Found".to_string(),
            message: "The page you requested does not exist.".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub view: LayoutContext<PostListContext>,
}

#[derive(Template)]
#[template(path = "posts.html")]
pub struct PostsTemplate {
    pub view: LayoutContext<PostListContext>,
}

#[derive(Template)]
#[template(path = "post.html")]
pub struct PostTemplate {
    pub view: LayoutContext<PostDetailContext>,
}

#[derive(Template)]
#[template(path = "about.html")]
pub struct AboutTemplate {
    pub view: LayoutContext<AboutContext>,
}

#[derive(Template)]
#[template(path = "notfound.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}
