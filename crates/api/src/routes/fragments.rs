//! HTML fragments swapped in by the htmx front end
//!
//! Every interpolated value goes through `html_escape`.

use std::fmt::Write as _;

use axum::response::Html;
use html_escape::{encode_double_quoted_attribute as attr, encode_safe as text};
use mercado_shared::{Collaborator, Product, Student, User};

pub fn error_message(message: &str) -> Html<String> {
    Html(format!(r#"<p class="error">{}</p>"#, text(message)))
}

pub fn notice(message: &str) -> Html<String> {
    Html(format!(r#"<p class="notice">{}</p>"#, text(message)))
}

/// Result box for the sign-in and sign-up forms
pub fn auth_response(success: bool, message: &str) -> Html<String> {
    let class = if success { "success" } else { "error" };
    Html(format!(
        r#"<div class="auth-response {class}" role="alert">{}</div>"#,
        text(message)
    ))
}

pub fn profile_summary(user: &User, student: &Student) -> Html<String> {
    Html(format!(
        concat!(
            r#"<section class="profile">"#,
            r#"<img src="{photo}" alt="{name}">"#,
            r#"<h2>{name_text}</h2>"#,
            r#"<p class="student-id">{student_id}</p>"#,
            "</section>"
        ),
        photo = attr(&photo_path(&student.id)),
        name = attr(&user.full_name()),
        name_text = text(&user.full_name()),
        student_id = text(&student.id),
    ))
}

/// Public path of a student's profile photo
pub fn photo_path(student_id: &str) -> String {
    format!("/uploads/{student_id}.jpg")
}

// =============================================================================
// Products
// =============================================================================

pub fn products_table(products: &[Product]) -> Html<String> {
    let mut html = String::from(
        r#"<table id="products"><thead><tr><th>Title</th><th>Price</th><th>Stock</th><th></th></tr></thead><tbody>"#,
    );
    if products.is_empty() {
        html.push_str(r#"<tr><td colspan="4">No products yet</td></tr>"#);
    }
    for product in products {
        html.push_str(&product_row_html(product));
    }
    html.push_str("</tbody></table>");
    Html(html)
}

pub fn product_row(product: &Product) -> Html<String> {
    Html(product_row_html(product))
}

fn product_row_html(product: &Product) -> String {
    let id = product.id.to_string();
    let mut row = String::new();
    let _ = write!(
        row,
        concat!(
            r#"<tr id="product-{id}">"#,
            "<td>{title}</td><td>{price}</td><td>{stock}</td>",
            "<td>",
            r#"<button hx-get="/api/products/edit/{id}" hx-target="closest tr" hx-swap="outerHTML">Edit</button>"#,
            r#"<button hx-delete="/api/products?id={id}" hx-target="closest tr" hx-swap="outerHTML" hx-confirm="Delete this product?">Delete</button>"#,
            "</td></tr>"
        ),
        id = attr(&id),
        title = text(&product.title),
        price = product.price,
        stock = product.stock,
    );
    row
}

pub fn product_edit_row(product: &Product) -> Html<String> {
    let id = product.id.to_string();
    Html(format!(
        concat!(
            r#"<tr id="product-{id}">"#,
            r#"<td><input type="hidden" name="id" value="{id}">"#,
            r#"<input name="title" value="{title}"></td>"#,
            r#"<td><input name="price" value="{price}" inputmode="decimal"></td>"#,
            r#"<td><input name="stock" value="{stock}" inputmode="numeric"></td>"#,
            "<td>",
            r#"<button hx-patch="/api/products" hx-include="closest tr" hx-target="closest tr" hx-swap="outerHTML">Save</button>"#,
            r#"<button hx-get="/api/products/cancel/{id}" hx-target="closest tr" hx-swap="outerHTML">Cancel</button>"#,
            "</td></tr>"
        ),
        id = attr(&id),
        title = attr(&product.title),
        price = product.price,
        stock = product.stock,
    ))
}

// =============================================================================
// Collaborators
// =============================================================================

pub fn collaborators_list(collaborators: &[Collaborator]) -> Html<String> {
    let mut html = String::from(r#"<ul id="collaborators">"#);
    if collaborators.is_empty() {
        html.push_str("<li>No collaborators yet</li>");
    }
    for collaborator in collaborators {
        let user = &collaborator.user;
        let id = user.id.to_string();
        let detail = match &collaborator.student {
            Some(student) => format!(
                "Intern {} ({} {})",
                student.id, student.grade, student.class_group
            ),
            None => format!(
                "External {}",
                user.personal_id.as_deref().unwrap_or_default()
            ),
        };
        let _ = write!(
            html,
            concat!(
                r#"<li id="collaborator-{id}">"#,
                "<strong>{name}</strong> <span>{email}</span> <small>{detail}</small>",
                r##"<button hx-delete="/api/collaborators?collaborator_id={id}" hx-target="#collaborators" hx-swap="outerHTML" hx-confirm="Remove this collaborator?">Remove</button>"##,
                "</li>"
            ),
            id = attr(&id),
            name = text(&user.full_name()),
            email = text(&user.email),
            detail = text(detail.trim()),
        );
    }
    html.push_str("</ul>");
    Html(html)
}

pub fn intern_fields() -> Html<String> {
    Html(
        concat!(
            r#"<input type="hidden" name="isIntern" value="true">"#,
            r#"<label>Student ID <input name="student_id" required></label>"#,
            r#"<label>Grade <input name="grade" required></label>"#,
            r#"<label>Group <input name="class_group" required></label>"#,
        )
        .to_string(),
    )
}

pub fn external_fields() -> Html<String> {
    Html(
        concat!(
            r#"<input type="hidden" name="isIntern" value="false">"#,
            r#"<label>Personal ID <input name="personal_id" required></label>"#,
        )
        .to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use mercado_shared::Price;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn user(given_names: &str) -> User {
        User {
            id: Uuid::new_v4(),
            email: "ana@example.com".to_string(),
            given_names: given_names.to_string(),
            paternal_surname: "López".to_string(),
            maternal_surname: "Ruiz".to_string(),
            personal_id: Some("CURP01".to_string()),
            password_hash: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn test_product_row_escapes_title() {
        let product = Product {
            id: Uuid::new_v4(),
            business_id: Uuid::new_v4(),
            title: r#"<b>"Taco"</b>"#.to_string(),
            price: Price::from_cents(2550).unwrap(),
            stock: 3,
        };

        let row = product_row(&product).0;
        assert!(!row.contains("<b>"));
        assert!(row.contains("25.50"));
        assert!(row.contains(&format!("/api/products/edit/{}", product.id)));

        let edit = product_edit_row(&product).0;
        assert!(edit.contains(r#"name="title""#));
        assert!(edit.contains("&quot;Taco&quot;"));
    }

    #[test]
    fn test_empty_tables() {
        assert!(products_table(&[]).0.contains("No products yet"));
        assert!(collaborators_list(&[]).0.contains("No collaborators yet"));
    }

    #[test]
    fn test_collaborator_kinds() {
        let external = Collaborator {
            user: user("Luis"),
            student: None,
        };
        let mut intern_user = user("Ana");
        intern_user.personal_id = None;
        let intern = Collaborator {
            student: Some(Student {
                id: "A0999999".to_string(),
                grade: "3".to_string(),
                class_group: "B".to_string(),
                user_id: intern_user.id,
            }),
            user: intern_user,
        };

        let html = collaborators_list(&[external, intern]).0;
        assert!(html.contains("External CURP01"));
        assert!(html.contains("Intern A0999999 (3 B)"));
    }

    #[test]
    fn test_profile_summary() {
        let user = user("Ana María");
        let student = Student {
            id: "A0123456".to_string(),
            grade: String::new(),
            class_group: String::new(),
            user_id: user.id,
        };
        let html = profile_summary(&user, &student).0;
        assert!(html.contains("/uploads/A0123456.jpg"));
        assert!(html.contains("Ana María López Ruiz"));
    }

    #[test]
    fn test_auth_response_escapes() {
        let html = auth_response(false, "Passwords don't match").0;
        assert!(html.contains("error"));
        assert!(!html.contains("don't"));
    }
}
