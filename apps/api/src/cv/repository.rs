use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::cv::listing::{like_pattern, CvListing};
use crate::errors::AppError;
use crate::models::cv::{Cv, CvFields};
use crate::pagination::PageRequest;

fn push_search(builder: &mut QueryBuilder<'_, Postgres>, listing: &CvListing) {
    if let Some(search) = &listing.search {
        let pattern = like_pattern(search);
        builder
            .push(" WHERE (firstname ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR lastname ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

pub async fn count_cvs(db: &PgPool, listing: &CvListing) -> Result<i64, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM cvs");
    push_search(&mut builder, listing);
    builder.build_query_scalar().fetch_one(db).await
}

/// Matching CVs in listing order. `None` returns every match.
pub async fn list_cvs(
    db: &PgPool,
    listing: &CvListing,
    page: Option<PageRequest>,
) -> Result<Vec<Cv>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM cvs");
    push_search(&mut builder, listing);
    builder.push(listing.order_by());
    if let Some(page) = page {
        builder.push(" LIMIT ").push_bind(page.limit());
        builder.push(" OFFSET ").push_bind(page.offset());
    }
    builder.build_query_as().fetch_all(db).await
}

pub async fn find_cv(db: &PgPool, id: i64) -> Result<Option<Cv>, sqlx::Error> {
    sqlx::query_as::<_, Cv>("SELECT * FROM cvs WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
}

/// Like `find_cv`, but a missing row is a 404.
pub async fn get_cv(db: &PgPool, id: i64) -> Result<Cv, AppError> {
    find_cv(db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("CV {id} not found")))
}

pub async fn create_cv(db: &PgPool, fields: &CvFields, owner_id: i64) -> Result<Cv, sqlx::Error> {
    sqlx::query_as::<_, Cv>(
        r#"
        INSERT INTO cvs (firstname, lastname, skills, projects, bio, contacts, owner_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(&fields.firstname)
    .bind(&fields.lastname)
    .bind(&fields.skills)
    .bind(&fields.projects)
    .bind(&fields.bio)
    .bind(&fields.contacts)
    .bind(owner_id)
    .fetch_one(db)
    .await
}

pub async fn update_cv(db: &PgPool, id: i64, fields: &CvFields) -> Result<Option<Cv>, sqlx::Error> {
    sqlx::query_as::<_, Cv>(
        r#"
        UPDATE cvs
        SET firstname = $1, lastname = $2, skills = $3, projects = $4,
            bio = $5, contacts = $6, updated_at = NOW()
        WHERE id = $7
        RETURNING *
        "#,
    )
    .bind(&fields.firstname)
    .bind(&fields.lastname)
    .bind(&fields.skills)
    .bind(&fields.projects)
    .bind(&fields.bio)
    .bind(&fields.contacts)
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn delete_cv(db: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM cvs WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}
