use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde::Serialize;

use super::{blog::Blog, user::User};
use crate::{
    app::AppError,
    schema::{comments, users},
};

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Associations, Serialize)]
#[diesel(belongs_to(Blog))]
#[diesel(belongs_to(User))]
#[diesel(table_name = comments)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Comment {
    pub id: i32,
    pub blog_id: i32,
    pub user_id: i32,
    pub body: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = comments)]
struct CommentInsert<'a> {
    pub blog_id: i32,
    pub user_id: i32,
    pub body: &'a str,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// A comment together with its author
#[derive(Debug, Serialize)]
pub struct CommentWithAuthor {
    #[serde(flatten)]
    pub comment: Comment,
    pub user: User,
}

impl Comment {
    /** Creates a comment on the blog specified */
    pub fn new(conn: &mut SqliteConnection, blog_id: i32, user_id: i32, body: &str) -> Result<Comment, AppError> {
        let time = Utc::now().naive_utc();
        let record = CommentInsert {
            blog_id,
            user_id,
            body,
            created_at: time,
            updated_at: time,
        };

        Ok(diesel::insert_into(comments::table)
            .values(&record)
            .get_result::<Comment>(conn)?)
    }

    /** Returns all comments posted in a blog with their authors, newest first */
    pub fn find_by_blog(conn: &mut SqliteConnection, blog_id: i32) -> Result<Vec<CommentWithAuthor>, AppError> {
        let rows = comments::table
            .inner_join(users::table)
            .filter(comments::blog_id.eq(blog_id))
            .order((comments::created_at.desc(), comments::id.desc()))
            .select((Comment::as_select(), User::as_select()))
            .load::<(Comment, User)>(conn)?;

        Ok(rows
            .into_iter()
            .map(|(comment, user)| CommentWithAuthor { comment, user })
            .collect())
    }

    /// Returns the comment only if it was posted on `blog_id`
    pub fn find_in_blog(conn: &mut SqliteConnection, blog_id: i32, comment_id: i32) -> Result<Comment, AppError> {
        Ok(comments::table
            .find(comment_id)
            .filter(comments::blog_id.eq(blog_id))
            .select(Comment::as_select())
            .first(conn)?)
    }

    pub fn with_author(self, conn: &mut SqliteConnection) -> Result<CommentWithAuthor, AppError> {
        let user = User::find_by_id(conn, self.user_id)?;
        Ok(CommentWithAuthor { comment: self, user })
    }

    pub fn edit(&mut self, conn: &mut SqliteConnection, body: &str) -> Result<(), AppError> {
        *self = diesel::update(comments::table.find(self.id))
            .set((comments::body.eq(body), comments::updated_at.eq(Utc::now().naive_utc())))
            .get_result::<Comment>(conn)?;
        Ok(())
    }

    /// The author and admins may edit a comment
    pub fn can_be_edited_by(&self, user: &User) -> bool {
        self.user_id == user.id || user.is_admin
    }

    /// The author, the blog's creator and admins may remove a comment
    pub fn can_be_deleted_by(&self, user: &User, blog: &Blog) -> bool {
        self.can_be_edited_by(user) || blog.creator_id == user.id
    }

    /** Deletes a comment from database */
    pub fn delete(&self, conn: &mut SqliteConnection) -> Result<(), AppError> {
        diesel::delete(comments::table.find(self.id)).execute(conn)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{
        db_utils::test_pool,
        models::{blog::BlogFields, user::DEFAULT_PROFILE_IMAGE},
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn test_comments_scoped_to_blog() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        let user = User::new(&mut conn, "Test", "User", "reader@example.com", "hash", DEFAULT_PROFILE_IMAGE).unwrap();
        let fields = |title: &str| BlogFields {
            title: title.to_string(),
            description: None,
            body: "Test body".to_string(),
            categories: vec!["A".to_string()],
        };
        let first = Blog::new(&mut conn, &user, &fields("First"), "/storage/a.png").unwrap();
        let second = Blog::new(&mut conn, &user, &fields("Second"), "/storage/b.png").unwrap();

        let older = Comment::new(&mut conn, first.id, user.id, "older").unwrap();
        let newer = Comment::new(&mut conn, first.id, user.id, "newer").unwrap();

        let listed: Vec<i32> = Comment::find_by_blog(&mut conn, first.id)
            .unwrap()
            .into_iter()
            .map(|entry| entry.comment.id)
            .collect();
        assert_eq!(listed, vec![newer.id, older.id]);
        assert!(Comment::find_by_blog(&mut conn, second.id).unwrap().is_empty());

        assert!(matches!(
            Comment::find_in_blog(&mut conn, second.id, older.id),
            Err(AppError::NotFound)
        ));
        assert_eq!(Comment::find_in_blog(&mut conn, first.id, older.id).unwrap(), older);
    }

    #[test]
    fn test_comment_permissions() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        let writer = User::new(&mut conn, "Writer", "One", "writer@example.com", "hash", DEFAULT_PROFILE_IMAGE).unwrap();
        let reader = User::new(&mut conn, "Reader", "Two", "reader@example.com", "hash", DEFAULT_PROFILE_IMAGE).unwrap();
        let stranger = User::new(&mut conn, "Stranger", "Three", "stranger@example.com", "hash", DEFAULT_PROFILE_IMAGE).unwrap();
        let blog = Blog::new(
            &mut conn,
            &writer,
            &BlogFields {
                title: "Post".to_string(),
                description: None,
                body: "Body".to_string(),
                categories: vec![],
            },
            "/storage/a.png",
        )
        .unwrap();
        let mut comment = Comment::new(&mut conn, blog.id, reader.id, "hello").unwrap();

        assert!(comment.can_be_edited_by(&reader));
        assert!(!comment.can_be_edited_by(&writer));
        assert!(comment.can_be_deleted_by(&writer, &blog));
        assert!(!comment.can_be_deleted_by(&stranger, &blog));

        comment.edit(&mut conn, "edited").unwrap();
        assert_eq!(comment.body, "edited");
    }
}
