//! Turning "type into this field and submit" or "click this" into requests.
//!
//! Both page drivers share this planning step, so form handling behaves the
//! same against the live source and against scripted test pages.

use crate::browser::Page;
use crate::error::BrowseError;
use scraper::{ElementRef, Html, Selector};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMethod {
    Get,
    Post,
}

/// A resolved form submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSubmission {
    pub action: Url,
    pub method: FormMethod,
    pub fields: Vec<(String, String)>,
}

/// What activating an element amounts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    Follow(Url),
    Submit(FormSubmission),
}

fn page_url(page: &Page) -> Result<Url, BrowseError> {
    Url::parse(&page.url).map_err(|_| crate::error::NetworkError::InvalidUrl(page.url.clone()).into())
}

fn parse_selector(css: &str) -> Result<Selector, BrowseError> {
    Selector::parse(css).map_err(|_| BrowseError::ElementNotFound {
        selector: css.to_string(),
    })
}

fn enclosing_form<'a>(element: ElementRef<'a>) -> Option<ElementRef<'a>> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "form")
}

/// Name/value pairs a browser would send for `form` before any typing.
fn default_fields(form: ElementRef<'_>) -> Vec<(String, String)> {
    let Ok(inputs) = Selector::parse("input[name], textarea[name]") else {
        return Vec::new();
    };
    form.select(&inputs)
        .filter_map(|el| {
            let v = el.value();
            let name = v.attr("name")?.to_string();
            if v.name() == "textarea" {
                return Some((name, el.text().collect()));
            }
            let kind = v.attr("type").unwrap_or("text").to_ascii_lowercase();
            match kind.as_str() {
                "submit" | "button" | "image" | "reset" | "file" => None,
                "checkbox" | "radio" if v.attr("checked").is_none() => None,
                _ => Some((name, v.attr("value").unwrap_or_default().to_string())),
            }
        })
        .collect()
}

fn form_target(form: ElementRef<'_>, base: &Url) -> Result<(Url, FormMethod), BrowseError> {
    let action = match form.value().attr("action").map(str::trim) {
        Some(a) if !a.is_empty() => base
            .join(a)
            .map_err(|_| crate::error::NetworkError::InvalidUrl(a.to_string()))?,
        _ => base.clone(),
    };
    let method = match form.value().attr("method") {
        Some(m) if m.eq_ignore_ascii_case("post") => FormMethod::Post,
        _ => FormMethod::Get,
    };
    Ok((action, method))
}

fn set_field(fields: &mut Vec<(String, String)>, name: &str, value: &str) {
    match fields.iter_mut().find(|(n, _)| n == name) {
        Some(slot) => slot.1 = value.to_string(),
        None => fields.push((name.to_string(), value.to_string())),
    }
}

/// Plan the submission of the form that contains the first field, with each
/// `(selector, value)` typed into its field.
pub fn plan_submission(page: &Page, typed: &[(&str, &str)]) -> Result<FormSubmission, BrowseError> {
    let Some((anchor, _)) = typed.first() else {
        return Err(BrowseError::ElementNotFound {
            selector: "<no fields>".to_string(),
        });
    };
    let base = page_url(page)?;
    let doc = Html::parse_document(&page.html);
    let anchor_sel = parse_selector(anchor)?;
    let anchor_el = doc
        .select(&anchor_sel)
        .next()
        .ok_or_else(|| BrowseError::ElementNotFound {
            selector: anchor.to_string(),
        })?;
    let form = enclosing_form(anchor_el).ok_or_else(|| BrowseError::NotActionable {
        selector: anchor.to_string(),
        reason: "not inside a form".to_string(),
    })?;

    let mut fields = default_fields(form);
    for (css, value) in typed {
        let sel = parse_selector(css)?;
        let el = form
            .select(&sel)
            .next()
            .ok_or_else(|| BrowseError::ElementNotFound {
                selector: css.to_string(),
            })?;
        let name = el.value().attr("name").ok_or_else(|| BrowseError::NotActionable {
            selector: css.to_string(),
            reason: "field has no name".to_string(),
        })?;
        set_field(&mut fields, name, value);
    }

    let (action, method) = form_target(form, &base)?;
    Ok(FormSubmission {
        action,
        method,
        fields,
    })
}

/// Plan what clicking the first element matching `css` does.
pub fn plan_activation(page: &Page, css: &str) -> Result<Activation, BrowseError> {
    let base = page_url(page)?;
    let doc = Html::parse_document(&page.html);
    let sel = parse_selector(css)?;
    let el = doc
        .select(&sel)
        .next()
        .ok_or_else(|| BrowseError::ElementNotFound {
            selector: css.to_string(),
        })?;
    let v = el.value();

    if let Some(href) = v.attr("href").map(str::trim) {
        if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
            return Err(BrowseError::NotActionable {
                selector: css.to_string(),
                reason: format!("link target {href:?} does not navigate"),
            });
        }
        let target = base
            .join(href)
            .map_err(|_| crate::error::NetworkError::InvalidUrl(href.to_string()))?;
        return Ok(Activation::Follow(target));
    }

    let submits = v.name() == "button" || (v.name() == "input" && v.attr("type") == Some("submit"));
    let form = enclosing_form(el).filter(|_| submits).ok_or_else(|| BrowseError::NotActionable {
        selector: css.to_string(),
        reason: "neither a link nor a form button".to_string(),
    })?;

    let mut fields = default_fields(form);
    if let (Some(name), Some(value)) = (v.attr("name"), v.attr("value")) {
        set_field(&mut fields, name, value);
    }
    let (mut action, method) = form_target(form, &base)?;
    if let Some(formaction) = v.attr("formaction").filter(|a| !a.trim().is_empty()) {
        action = base
            .join(formaction)
            .map_err(|_| crate::error::NetworkError::InvalidUrl(formaction.to_string()))?;
    }
    Ok(Activation::Submit(FormSubmission {
        action,
        method,
        fields,
    }))
}
