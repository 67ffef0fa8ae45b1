use chrono::{NaiveDateTime, Utc};
use diesel::dsl::not;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde::Serialize;

use super::blog::Blog;
use crate::{
    app::AppError,
    schema::{blog_category, blogs, categories},
};

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = categories)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Category {
    pub id: i32,
    pub name: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = categories)]
struct CategoryInsert<'a> {
    pub name: &'a str,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Row of the blog <-> category join table
#[derive(Debug, Clone, Copy, PartialEq, Queryable, Selectable, Insertable, Identifiable, Associations)]
#[diesel(belongs_to(Blog))]
#[diesel(belongs_to(Category))]
#[diesel(table_name = blog_category)]
#[diesel(primary_key(blog_id, category_id))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct BlogCategory {
    pub blog_id: i32,
    pub category_id: i32,
}

#[derive(Debug, Serialize)]
pub struct CategoryListing {
    #[serde(flatten)]
    pub category: Category,
    pub blogs_count: i64,
}

#[derive(Debug, Serialize)]
pub struct CategoryDetails {
    #[serde(flatten)]
    pub category: Category,
    pub blogs: Vec<Blog>,
}

impl Category {
    /// Inserts a category, failing with `Conflict` when the name exists
    pub fn new(conn: &mut SqliteConnection, name: &str) -> Result<Category, AppError> {
        let time = Utc::now().naive_utc();
        Ok(diesel::insert_into(categories::table)
            .values(&CategoryInsert {
                name,
                created_at: time,
                updated_at: time,
            })
            .get_result::<Category>(conn)?)
    }

    /// Returns the category with exactly this name, creating it if missing.
    /// Concurrent creators of the same name end up with the same row.
    pub fn get_or_create(conn: &mut SqliteConnection, name: &str) -> Result<Category, AppError> {
        let time = Utc::now().naive_utc();
        diesel::insert_into(categories::table)
            .values(&CategoryInsert {
                name,
                created_at: time,
                updated_at: time,
            })
            .on_conflict(categories::name)
            .do_nothing()
            .execute(conn)?;

        Ok(categories::table
            .filter(categories::name.eq(name))
            .select(Category::as_select())
            .first(conn)?)
    }

    pub fn find_by_id(conn: &mut SqliteConnection, category_id: i32) -> Result<Category, AppError> {
        Ok(categories::table
            .find(category_id)
            .select(Category::as_select())
            .first(conn)?)
    }

    pub fn name_taken(conn: &mut SqliteConnection, name: &str, except: Option<i32>) -> Result<bool, AppError> {
        let mut query = categories::table.filter(categories::name.eq(name)).into_boxed();
        if let Some(category_id) = except {
            query = query.filter(categories::id.ne(category_id));
        }

        let count: i64 = query.count().get_result(conn)?;
        Ok(count > 0)
    }

    /** Every category by name, with the number of blogs using it */
    pub fn list(conn: &mut SqliteConnection) -> Result<Vec<CategoryListing>, AppError> {
        let all = categories::table
            .select(Category::as_select())
            .order(categories::name.asc())
            .load::<Category>(conn)?;
        let counts = BlogCategory::belonging_to(&all)
            .select(BlogCategory::as_select())
            .load::<BlogCategory>(conn)?
            .grouped_by(&all);

        Ok(all
            .into_iter()
            .zip(counts)
            .map(|(category, links)| CategoryListing {
                category,
                blogs_count: links.len() as i64,
            })
            .collect())
    }

    pub fn details(self, conn: &mut SqliteConnection) -> Result<CategoryDetails, AppError> {
        let blogs = BlogCategory::belonging_to(&self)
            .inner_join(blogs::table)
            .select(Blog::as_select())
            .order((blogs::created_at.desc(), blogs::id.desc()))
            .load::<Blog>(conn)?;

        Ok(CategoryDetails { category: self, blogs })
    }

    pub fn rename(&mut self, conn: &mut SqliteConnection, name: &str) -> Result<(), AppError> {
        *self = diesel::update(categories::table.find(self.id))
            .set((categories::name.eq(name), categories::updated_at.eq(Utc::now().naive_utc())))
            .get_result::<Category>(conn)?;
        Ok(())
    }

    /** Deletes the category, its blog links cascade */
    pub fn delete(&self, conn: &mut SqliteConnection) -> Result<(), AppError> {
        diesel::delete(categories::table.find(self.id)).execute(conn)?;
        Ok(())
    }

    /// Categories of each blog ordered by name, one vector per blog in the order of `items`
    pub fn for_blogs(conn: &mut SqliteConnection, items: &[Blog]) -> Result<Vec<Vec<Category>>, AppError> {
        let links = BlogCategory::belonging_to(items)
            .inner_join(categories::table)
            .select((BlogCategory::as_select(), Category::as_select()))
            .order(categories::name.asc())
            .load::<(BlogCategory, Category)>(conn)?;

        Ok(links
            .grouped_by(items)
            .into_iter()
            .map(|group| group.into_iter().map(|(_, category)| category).collect())
            .collect())
    }
}

/// Makes the blog's categories exactly `names`.
///
/// Names are trimmed, blank and repeated names are skipped, missing categories are
/// created. Links to categories not in `names` are removed. Running it twice with the
/// same input leaves the same set behind.
pub fn sync_blog_categories(
    conn: &mut SqliteConnection,
    blog_id: i32,
    names: &[String],
) -> Result<Vec<Category>, AppError> {
    let mut synced: Vec<Category> = Vec::with_capacity(names.len());
    for name in names.iter().map(|name| name.trim()).filter(|name| !name.is_empty()) {
        if synced.iter().any(|category| category.name == name) {
            continue;
        }
        synced.push(Category::get_or_create(conn, name)?);
    }

    let ids: Vec<i32> = synced.iter().map(|category| category.id).collect();

    diesel::delete(
        blog_category::table
            .filter(blog_category::blog_id.eq(blog_id))
            .filter(not(blog_category::category_id.eq_any(&ids))),
    )
    .execute(conn)?;

    for category_id in &ids {
        diesel::insert_into(blog_category::table)
            .values(&BlogCategory {
                blog_id,
                category_id: *category_id,
            })
            .on_conflict_do_nothing()
            .execute(conn)?;
    }

    log::debug!("blog {} synced to categories {:?}", blog_id, ids);

    Ok(synced)
}
