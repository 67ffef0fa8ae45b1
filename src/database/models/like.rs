use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde::Serialize;

use super::{blog::Blog, user::User};
use crate::{app::AppError, schema::likes};

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Associations, Serialize)]
#[diesel(belongs_to(Blog))]
#[diesel(belongs_to(User))]
#[diesel(table_name = likes)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Like {
    pub id: i32,
    pub blog_id: i32,
    pub user_id: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = likes)]
struct LikeInsert {
    pub blog_id: i32,
    pub user_id: i32,
    pub created_at: NaiveDateTime,
}

impl Like {
    /// Likes the blog if the user has not yet, otherwise takes the like back.
    /// Returns the new like, or `None` when it was removed.
    ///
    /// The unique (blog, user) index makes a second like a no-op insert,
    /// which is how an existing like is detected.
    pub fn toggle(conn: &mut SqliteConnection, user_id: i32, blog_id: i32) -> Result<Option<Like>, AppError> {
        conn.transaction::<_, AppError, _>(|conn| {
            let inserted = diesel::insert_into(likes::table)
                .values(&LikeInsert {
                    blog_id,
                    user_id,
                    created_at: Utc::now().naive_utc(),
                })
                .on_conflict_do_nothing()
                .execute(conn)?;

            if inserted == 0 {
                diesel::delete(
                    likes::table
                        .filter(likes::blog_id.eq(blog_id))
                        .filter(likes::user_id.eq(user_id)),
                )
                .execute(conn)?;
                return Ok(None);
            }

            let like = likes::table
                .filter(likes::blog_id.eq(blog_id))
                .filter(likes::user_id.eq(user_id))
                .select(Like::as_select())
                .first(conn)?;
            Ok(Some(like))
        })
    }

    pub fn count_for_blog(conn: &mut SqliteConnection, blog_id: i32) -> Result<i64, AppError> {
        Ok(likes::table
            .filter(likes::blog_id.eq(blog_id))
            .count()
            .get_result(conn)?)
    }

    pub fn get_by_blog_id(conn: &mut SqliteConnection, blog_id: i32) -> Result<Vec<Like>, AppError> {
        Ok(likes::table
            .filter(likes::blog_id.eq(blog_id))
            .order(likes::id.asc())
            .select(Like::as_select())
            .load(conn)?)
    }

    /// Returns the like only if it belongs to `blog_id`
    pub fn find_in_blog(conn: &mut SqliteConnection, blog_id: i32, like_id: i32) -> Result<Like, AppError> {
        Ok(likes::table
            .find(like_id)
            .filter(likes::blog_id.eq(blog_id))
            .select(Like::as_select())
            .first(conn)?)
    }

    pub fn can_be_deleted_by(&self, user: &User) -> bool {
        self.user_id == user.id || user.is_admin
    }

    pub fn delete(&self, conn: &mut SqliteConnection) -> Result<(), AppError> {
        diesel::delete(likes::table.find(self.id)).execute(conn)?;
        Ok(())
    }
}
