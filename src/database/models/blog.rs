use std::collections::HashMap;

use chrono::{NaiveDateTime, Utc};
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde::Serialize;

use super::{
    category::{sync_blog_categories, Category},
    comment::Comment,
    like::Like,
    user::User,
};
use crate::{
    app::AppError,
    database::{
        db_utils::unicode_lower,
        pagination::{offset, Page, PER_PAGE},
    },
    schema::{blogs, comments, likes, users},
};

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Associations, Serialize)]
#[diesel(belongs_to(User, foreign_key = creator_id))]
#[diesel(table_name = blogs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Blog {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub body: String,
    /// Public path of the preview image, `/storage/uploads/...`
    pub preview: String,
    pub creator_id: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = blogs)]
struct BlogInsert<'a> {
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub body: &'a str,
    pub preview: &'a str,
    pub creator_id: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Already validated values submitted when creating or editing a blog
#[derive(Debug, Clone)]
pub struct BlogFields {
    pub title: String,
    pub description: Option<String>,
    pub body: String,
    pub categories: Vec<String>,
}

/// A blog as shown in listings
#[derive(Debug, Serialize)]
pub struct BlogSummary {
    #[serde(flatten)]
    pub blog: Blog,
    pub user: User,
    pub categories: Vec<Category>,
    pub likes_count: i64,
    pub comments_count: i64,
}

/// A blog with every relation loaded
#[derive(Debug, Serialize)]
pub struct BlogDetails {
    #[serde(flatten)]
    pub blog: Blog,
    pub user: User,
    pub categories: Vec<Category>,
    pub likes: Vec<Like>,
    pub comments: Vec<Comment>,
    pub likes_count: i64,
    pub comments_count: i64,
}

impl Blog {
    /// Inserts the blog owned by `creator` and links its categories, all or nothing
    pub fn new(
        conn: &mut SqliteConnection,
        creator: &User,
        fields: &BlogFields,
        preview: &str,
    ) -> Result<Blog, AppError> {
        conn.transaction::<_, AppError, _>(|conn| {
            let time = Utc::now().naive_utc();
            let to_insert = BlogInsert {
                title: &fields.title,
                description: fields.description.as_deref(),
                body: &fields.body,
                preview,
                creator_id: creator.id,
                created_at: time,
                updated_at: time,
            };

            let ret_blog = diesel::insert_into(blogs::table)
                .values(&to_insert)
                .get_result::<Blog>(conn)?;
            sync_blog_categories(conn, ret_blog.id, &fields.categories)?;

            Ok(ret_blog)
        })
    }

    pub fn get_by_id(conn: &mut SqliteConnection, blog_id: i32) -> Result<Blog, AppError> {
        Ok(blogs::table.find(blog_id).select(Blog::as_select()).first(conn)?)
    }

    /// Whether a blog (other than `except`) already has this title
    pub fn title_taken(conn: &mut SqliteConnection, title: &str, except: Option<i32>) -> Result<bool, AppError> {
        let mut query = blogs::table.filter(blogs::title.eq(title)).into_boxed();
        if let Some(blog_id) = except {
            query = query.filter(blogs::id.ne(blog_id));
        }

        let count: i64 = query.count().get_result(conn)?;
        Ok(count > 0)
    }

    /// Overwrites every editable field and replaces the category set.
    /// The preview only changes when a new one is given.
    pub fn edit(
        &mut self,
        conn: &mut SqliteConnection,
        fields: &BlogFields,
        preview: Option<&str>,
    ) -> Result<(), AppError> {
        let blog_id = self.id;
        let preview = preview.unwrap_or(&self.preview).to_string();

        *self = conn.transaction::<_, AppError, _>(|conn| {
            let updated = diesel::update(blogs::table.find(blog_id))
                .set((
                    blogs::title.eq(&fields.title),
                    blogs::description.eq(fields.description.as_deref()),
                    blogs::body.eq(&fields.body),
                    blogs::preview.eq(&preview),
                    blogs::updated_at.eq(Utc::now().naive_utc()),
                ))
                .get_result::<Blog>(conn)?;
            sync_blog_categories(conn, blog_id, &fields.categories)?;

            Ok(updated)
        })?;

        Ok(())
    }

    /** Removes the blog, comments, likes and category links cascade */
    pub fn delete_by_id(conn: &mut SqliteConnection, blog_id: i32) -> Result<(), AppError> {
        let deleted = diesel::delete(blogs::table.find(blog_id)).execute(conn)?;
        if deleted == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    /** Preview paths of every blog written by the user */
    pub fn previews_by_creator(conn: &mut SqliteConnection, user_id: i32) -> Result<Vec<String>, AppError> {
        Ok(blogs::table
            .filter(blogs::creator_id.eq(user_id))
            .select(blogs::preview)
            .load(conn)?)
    }

    /// Only the creator or an admin may edit or delete a blog
    pub fn can_be_modified_by(&self, user: &User) -> bool {
        self.creator_id == user.id || user.is_admin
    }

    /// Newest first, `PER_PAGE` per page, optionally narrowed to titles containing `search`
    pub fn paginate(
        conn: &mut SqliteConnection,
        page: i64,
        search: Option<&str>,
    ) -> Result<Page<BlogSummary>, AppError> {
        let pattern = search
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(|term| format!("%{}%", escape_like(&term.to_lowercase())));

        let mut count_query = blogs::table.into_boxed();
        let mut query = blogs::table.into_boxed();
        if let Some(pattern) = &pattern {
            count_query = count_query.filter(unicode_lower(blogs::title).like(pattern.clone()).escape('\\'));
            query = query.filter(unicode_lower(blogs::title).like(pattern.clone()).escape('\\'));
        }

        let total: i64 = count_query.count().get_result(conn)?;
        let items = match offset(page, PER_PAGE) {
            Some(offset) => query
                .select(Blog::as_select())
                .order((blogs::created_at.desc(), blogs::id.desc()))
                .limit(PER_PAGE)
                .offset(offset)
                .load::<Blog>(conn)?,
            None => Vec::new(),
        };

        Ok(Page::new(Blog::summarize(conn, items)?, page.max(1), PER_PAGE, total))
    }

    /** Attaches creator, categories and counters to each blog, keeping their order */
    pub fn summarize(conn: &mut SqliteConnection, items: Vec<Blog>) -> Result<Vec<BlogSummary>, AppError> {
        let blog_ids: Vec<i32> = items.iter().map(|blog| blog.id).collect();
        let creator_ids: Vec<i32> = items.iter().map(|blog| blog.creator_id).collect();

        let creators: HashMap<i32, User> = users::table
            .filter(users::id.eq_any(&creator_ids))
            .select(User::as_select())
            .load::<User>(conn)?
            .into_iter()
            .map(|user| (user.id, user))
            .collect();
        let categories = Category::for_blogs(conn, &items)?;
        let like_counts: HashMap<i32, i64> = likes::table
            .filter(likes::blog_id.eq_any(&blog_ids))
            .group_by(likes::blog_id)
            .select((likes::blog_id, count_star()))
            .load::<(i32, i64)>(conn)?
            .into_iter()
            .collect();
        let comment_counts: HashMap<i32, i64> = comments::table
            .filter(comments::blog_id.eq_any(&blog_ids))
            .group_by(comments::blog_id)
            .select((comments::blog_id, count_star()))
            .load::<(i32, i64)>(conn)?
            .into_iter()
            .collect();

        items
            .into_iter()
            .zip(categories)
            .map(|(blog, categories)| {
                let user = creators
                    .get(&blog.creator_id)
                    .cloned()
                    .ok_or_else(|| AppError::internal(format!("blog {} has no creator", blog.id)))?;
                Ok(BlogSummary {
                    likes_count: like_counts.get(&blog.id).copied().unwrap_or(0),
                    comments_count: comment_counts.get(&blog.id).copied().unwrap_or(0),
                    user,
                    categories,
                    blog,
                })
            })
            .collect()
    }

    /** Loads creator, categories, likes and comments */
    pub fn details(self, conn: &mut SqliteConnection) -> Result<BlogDetails, AppError> {
        let user = User::find_by_id(conn, self.creator_id)?;
        let categories = Category::for_blogs(conn, std::slice::from_ref(&self))?
            .pop()
            .unwrap_or_default();
        let likes = Like::belonging_to(&self)
            .select(Like::as_select())
            .order(likes::id.asc())
            .load::<Like>(conn)?;
        let comments = Comment::belonging_to(&self)
            .select(Comment::as_select())
            .order((comments::created_at.desc(), comments::id.desc()))
            .load::<Comment>(conn)?;

        Ok(BlogDetails {
            likes_count: likes.len() as i64,
            comments_count: comments.len() as i64,
            blog: self,
            user,
            categories,
            likes,
            comments,
        })
    }
}

/// Escapes `\`, `%` and `_` so user input only ever matches literally
fn escape_like(term: &str) -> String {
    let mut ret = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            ret.push('\\');
        }
        ret.push(c);
    }
    ret
}
