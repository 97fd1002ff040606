//! Server-rendered HTML. Every interpolated value goes through `escape_html`.

use std::fmt::Write;

use axum::response::Html;

use crate::ai::{Language, TranslatedCv};
use crate::auth::session::{Flash, FlashLevel};
use crate::cv::listing::{CvListing, CvSortField};
use crate::models::cv::{Cv, CvFields};
use crate::models::user::User;
use crate::pagination::SortOrder;
use crate::tasks::poll::{AnalysisView, PdfProgress};

const STYLE: &str = "body{font-family:system-ui,sans-serif;max-width:960px;margin:0 auto;padding:1rem;color:#222}\
nav{display:flex;gap:1rem;align-items:center;border-bottom:1px solid #ddd;padding-bottom:.5rem;margin-bottom:1rem}\
nav .spacer{flex:1}table{width:100%;border-collapse:collapse}td,th{padding:.4rem;border-bottom:1px solid #eee;text-align:left}\
.flash{padding:.5rem;border-radius:4px;margin:.5rem 0}.flash-success{background:#e6f4ea}.flash-error{background:#fce8e6}\
.flash-info{background:#e8f0fe}.warning{color:#b06000}.error{color:#c5221f}section{margin:1.5rem 0}\
pre{white-space:pre-wrap;font-family:inherit}progress{width:100%}label{display:block;margin:.5rem 0}\
input[type=text],input[type=email],input[type=password],textarea{width:100%;box-sizing:border-box}";

pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn text_or_placeholder(value: &str) -> String {
    if value.trim().is_empty() {
        "<em>Not provided</em>".to_string()
    } else {
        format!("<pre>{}</pre>", escape_html(value))
    }
}

fn flash_class(level: FlashLevel) -> &'static str {
    match level {
        FlashLevel::Success => "flash flash-success",
        FlashLevel::Error => "flash flash-error",
        FlashLevel::Info => "flash flash-info",
    }
}

/// Shared page chrome. `refresh` adds a 2 second reload while background work is running.
pub fn layout(title: &str, user: Option<&User>, flashes: &[Flash], refresh: bool, body: &str) -> Html<String> {
    let mut html = String::new();
    let _ = write!(
        html,
        "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\">\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">"
    );
    if refresh {
        html.push_str("<meta http-equiv=\"refresh\" content=\"2\">");
    }
    let _ = write!(
        html,
        "<title>{} | CV Project</title><style>{STYLE}</style></head><body><nav>\
         <a href=\"/\"><strong>CV Project</strong></a><a href=\"/cvs/\">CVs</a><span class=\"spacer\"></span>",
        escape_html(title)
    );
    match user {
        Some(user) => {
            let _ = write!(
                html,
                "<span>Signed in as {}</span><a href=\"/logout/\">Log out</a>",
                escape_html(&user.username)
            );
        }
        None => html.push_str("<a href=\"/login/\">Log in</a><a href=\"/register/\">Register</a>"),
    }
    html.push_str("</nav><main>");
    for flash in flashes {
        let _ = write!(
            html,
            "<div class=\"{}\">{}</div>",
            flash_class(flash.level),
            escape_html(&flash.message)
        );
    }
    html.push_str(body);
    html.push_str("</main></body></html>");
    Html(html)
}

pub fn home_page(user: Option<&User>) -> Html<String> {
    let body = "<h1>CV Project</h1>\
        <p>Create, search and share CVs. Export them to PDF, email them, \
        translate them and ask questions about them.</p>\
        <p><a href=\"/cvs/\">Browse CVs</a> | <a href=\"/cv/create/\">Create a CV</a></p>";
    layout("Home", user, &[], false, body)
}

pub fn error_page(status: u16, message: &str) -> Html<String> {
    let body = format!("<h1>Error {status}</h1><p class=\"error\">{}</p>", escape_html(message));
    layout("Error", None, &[], false, &body)
}

// ────────────────────────────────────────────────────────────────────────────
// Accounts
// ────────────────────────────────────────────────────────────────────────────

pub fn login_page(next: &str, username: &str, error: Option<&str>) -> Html<String> {
    let mut body = String::from("<h1>Log in</h1>");
    if let Some(error) = error {
        let _ = write!(body, "<p class=\"error\">{}</p>", escape_html(error));
    }
    let _ = write!(
        body,
        "<form method=\"post\" action=\"/login/\">\
         <input type=\"hidden\" name=\"next\" value=\"{}\">\
         <label>Username <input type=\"text\" name=\"username\" value=\"{}\" required></label>\
         <label>Password <input type=\"password\" name=\"password\" required></label>\
         <button type=\"submit\">Log in</button></form>\
         <p>No account? <a href=\"/register/\">Register</a></p>",
        escape_html(next),
        escape_html(username)
    );
    layout("Log in", None, &[], false, &body)
}

pub fn register_page(username: &str, email: &str, error: Option<&str>) -> Html<String> {
    let mut body = String::from("<h1>Register</h1>");
    if let Some(error) = error {
        let _ = write!(body, "<p class=\"error\">{}</p>", escape_html(error));
    }
    let _ = write!(
        body,
        "<form method=\"post\" action=\"/register/\">\
         <label>Username <input type=\"text\" name=\"username\" value=\"{}\" required></label>\
         <label>Email (optional) <input type=\"email\" name=\"email\" value=\"{}\"></label>\
         <label>Password <input type=\"password\" name=\"password\" minlength=\"8\" required></label>\
         <button type=\"submit\">Create account</button></form>",
        escape_html(username),
        escape_html(email)
    );
    layout("Register", None, &[], false, &body)
}

// ────────────────────────────────────────────────────────────────────────────
// CV pages
// ────────────────────────────────────────────────────────────────────────────

fn selected(is: bool) -> &'static str {
    if is {
        " selected"
    } else {
        ""
    }
}

pub fn cv_list_page(user: &User, flashes: &[Flash], cvs: &[Cv], listing: &CvListing) -> Html<String> {
    let q = listing.search.as_deref().unwrap_or_default();
    let mut body = String::from("<h1>CVs</h1><p><a href=\"/cv/create/\">Create a CV</a></p>");

    let _ = write!(
        body,
        "<form method=\"get\" action=\"/cvs/\">\
         <input type=\"text\" name=\"q\" value=\"{}\" placeholder=\"Search by name\"> \
         <select name=\"sort\">",
        escape_html(q)
    );
    for (field, label) in [
        (CvSortField::CreatedAt, "Created"),
        (CvSortField::UpdatedAt, "Updated"),
        (CvSortField::Firstname, "First name"),
        (CvSortField::Lastname, "Last name"),
    ] {
        let _ = write!(
            body,
            "<option value=\"{}\"{}>{label}</option>",
            field.column(),
            selected(listing.sort == field)
        );
    }
    let _ = write!(
        body,
        "</select> <select name=\"order\">\
         <option value=\"desc\"{}>Descending</option><option value=\"asc\"{}>Ascending</option>\
         </select> <button type=\"submit\">Apply</button></form>",
        selected(listing.order == SortOrder::Desc),
        selected(listing.order == SortOrder::Asc)
    );

    if cvs.is_empty() {
        body.push_str("<p>No CVs found.</p>");
    } else {
        body.push_str("<table><thead><tr><th>Name</th><th>Skills</th><th>Updated</th></tr></thead><tbody>");
        for cv in cvs {
            let _ = write!(
                body,
                "<tr><td><a href=\"/cv/{}/\">{}</a></td><td>{}</td><td>{}</td></tr>",
                cv.id,
                escape_html(&cv.full_name()),
                escape_html(&cv.skills),
                cv.updated_at.format("%Y-%m-%d %H:%M")
            );
        }
        body.push_str("</tbody></table>");
    }

    layout("CVs", Some(user), flashes, false, &body)
}

/// Create and edit share one form.
pub fn cv_form_page(user: &User, heading: &str, action: &str, fields: &CvFields, errors: &[String]) -> Html<String> {
    let mut body = format!("<h1>{}</h1>", escape_html(heading));
    if !errors.is_empty() {
        body.push_str("<ul class=\"error\">");
        for error in errors {
            let _ = write!(body, "<li>{}</li>", escape_html(error));
        }
        body.push_str("</ul>");
    }
    let _ = write!(
        body,
        "<form method=\"post\" action=\"{}\">\
         <label>First name <input type=\"text\" name=\"firstname\" maxlength=\"100\" value=\"{}\"></label>\
         <label>Last name <input type=\"text\" name=\"lastname\" maxlength=\"100\" value=\"{}\"></label>\
         <label>Bio <textarea name=\"bio\" rows=\"4\">{}</textarea></label>\
         <label>Skills <textarea name=\"skills\" rows=\"4\">{}</textarea></label>\
         <label>Projects <textarea name=\"projects\" rows=\"4\">{}</textarea></label>\
         <label>Contacts <textarea name=\"contacts\" rows=\"3\">{}</textarea></label>\
         <button type=\"submit\">Save</button> <a href=\"/cvs/\">Cancel</a></form>",
        escape_html(action),
        escape_html(&fields.firstname),
        escape_html(&fields.lastname),
        escape_html(&fields.bio),
        escape_html(&fields.skills),
        escape_html(&fields.projects),
        escape_html(&fields.contacts)
    );
    layout(heading, Some(user), &[], false, &body)
}

pub fn cv_delete_page(user: &User, cv: &Cv) -> Html<String> {
    let body = format!(
        "<h1>Delete CV</h1><p>Are you sure you want to delete the CV of <strong>{}</strong>?</p>\
         <form method=\"post\" action=\"/cv/{}/delete/\"><button type=\"submit\">Yes, delete</button> \
         <a href=\"/cv/{}/\">Cancel</a></form>",
        escape_html(&cv.full_name()),
        cv.id,
        cv.id
    );
    layout("Delete CV", Some(user), &[], false, &body)
}

/// Everything the detail page shows besides the CV itself.
pub struct CvDetail<'a> {
    pub cv: &'a Cv,
    pub user: &'a User,
    pub can_modify: bool,
    pub flashes: &'a [Flash],
    pub translated: Option<&'a TranslatedCv>,
    pub pdf: &'a PdfProgress,
    pub analysis: &'a AnalysisView,
}

pub fn cv_detail_page(detail: &CvDetail<'_>) -> Html<String> {
    let cv = detail.cv;
    let mut body = format!("<h1>{}</h1>", escape_html(&cv.full_name()));

    if detail.can_modify {
        let _ = write!(
            body,
            "<p><a href=\"/cv/{id}/edit/\">Edit</a> | <a href=\"/cv/{id}/delete/\">Delete</a></p>",
            id = cv.id
        );
    }

    for (label, value) in [
        ("Bio", &cv.bio),
        ("Skills", &cv.skills),
        ("Projects", &cv.projects),
        ("Contacts", &cv.contacts),
    ] {
        let _ = write!(body, "<section><h2>{label}</h2>{}</section>", text_or_placeholder(value));
    }

    pdf_section(&mut body, cv.id, detail.pdf);
    email_section(&mut body, cv.id);
    translation_section(&mut body, cv.id, detail.translated);
    analysis_section(&mut body, cv.id, detail.analysis);

    let refresh = detail.pdf.processing || detail.analysis.processing;
    layout(&cv.full_name(), Some(detail.user), detail.flashes, refresh, &body)
}

fn pdf_section(body: &mut String, cv_id: i64, pdf: &PdfProgress) {
    let _ = write!(
        body,
        "<section><h2>PDF</h2><p><a href=\"/cv/{cv_id}/pdf/\">Download PDF now</a></p>"
    );
    if pdf.processing {
        let _ = write!(
            body,
            "<progress max=\"100\" value=\"{}\"></progress><p>{}</p>",
            pdf.progress,
            escape_html(&pdf.status)
        );
    } else {
        if let Some(url) = &pdf.download_url {
            let _ = write!(
                body,
                "<p>Your PDF is ready: <a href=\"{}\">download</a></p>",
                escape_html(url)
            );
        }
        if !pdf.status.is_empty() {
            let _ = write!(body, "<p class=\"error\">{}</p>", escape_html(&pdf.status));
        }
        let _ = write!(
            body,
            "<form method=\"post\" action=\"/cv/{cv_id}/\">\
             <button type=\"submit\" name=\"download_pdf_async\" value=\"1\">Generate PDF in background</button></form>"
        );
    }
    body.push_str("</section>");
}

fn email_section(body: &mut String, cv_id: i64) {
    let _ = write!(
        body,
        "<section><h2>Email</h2><form method=\"post\" action=\"/cv/{cv_id}/\">\
         <label>Recipient <input type=\"email\" name=\"email\" required></label>\
         <button type=\"submit\">Send PDF</button></form></section>"
    );
}

fn translation_section(body: &mut String, cv_id: i64, translated: Option<&TranslatedCv>) {
    let _ = write!(
        body,
        "<section><h2>Translate</h2><form method=\"post\" action=\"/cv/{cv_id}/\"><select name=\"lang\">"
    );
    for language in Language::ALL {
        let _ = write!(body, "<option value=\"{0}\">{0}</option>", language.name());
    }
    body.push_str("</select> <button type=\"submit\">Translate</button></form>");

    if let Some(t) = translated {
        if let Some(warning) = t.warning() {
            let _ = write!(body, "<p class=\"warning\">{}</p>", escape_html(warning));
        }
        let _ = write!(body, "<h3>{} ({})</h3>", escape_html(&t.name), t.language);
        for (label, value) in [
            ("Bio", &t.bio),
            ("Skills", &t.skills),
            ("Projects", &t.projects),
            ("Contacts", &t.contacts),
        ] {
            let _ = write!(body, "<h4>{label}</h4>{}", text_or_placeholder(value));
        }
    }
    body.push_str("</section>");
}

fn analysis_section(body: &mut String, cv_id: i64, analysis: &AnalysisView) {
    body.push_str("<section><h2>Analysis</h2>");
    if let Some(warning) = analysis.warning {
        let _ = write!(body, "<p class=\"warning\">{}</p>", escape_html(warning));
    }
    if let Some(error) = &analysis.error {
        let _ = write!(body, "<p class=\"error\">{}</p>", escape_html(error));
    }

    if let Some(complete) = &analysis.complete {
        let _ = write!(
            body,
            "<p><strong>Q:</strong> {}</p><pre>{}</pre>\
             <form method=\"post\" action=\"/cv/{cv_id}/\">\
             <button type=\"submit\" name=\"clear_analysis\" value=\"1\">Ask another question</button></form>",
            escape_html(&complete.question),
            escape_html(&complete.analysis)
        );
    } else if analysis.processing {
        let _ = write!(
            body,
            "<p>Analysing: <em>{}</em></p><p>This page refreshes automatically.</p>",
            escape_html(&analysis.question)
        );
    } else {
        let _ = write!(
            body,
            "<form method=\"post\" action=\"/cv/{cv_id}/\">\
             <label>Question <input type=\"text\" name=\"analysis_question\" \
             placeholder=\"What are the strongest skills in this CV?\"></label>\
             <button type=\"submit\" name=\"start_analysis\" value=\"1\">Analyse</button></form>"
        );
    }
    body.push_str("</section>");
}
