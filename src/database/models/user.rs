use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde::Serialize;

use super::{blog::Blog, comment::Comment, like::Like};
use crate::{app::AppError, schema::users};

/// Stored for users who registered without uploading a picture
pub const DEFAULT_PROFILE_IMAGE: &str = "/storage/uploads/profile/default.png";

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct User {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// Argon2 PHC string of the password
    #[serde(skip_serializing)]
    pub password: String,
    pub profile_image: String,
    pub is_admin: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = users)]
pub struct UserInsert<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub profile_image: &'a str,
    pub is_admin: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// A user together with everything they authored
#[derive(Debug, Serialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: User,
    pub blogs: Vec<Blog>,
    pub comments: Vec<Comment>,
    pub likes: Vec<Like>,
}

impl User {
    /// Pushes a new user in the database, `password` must already be hashed
    pub fn new(
        conn: &mut SqliteConnection,
        first_name: &str,
        last_name: &str,
        email: &str,
        password: &str,
        profile_image: &str,
    ) -> Result<User, AppError> {
        let time = Utc::now().naive_utc();
        let to_insert = UserInsert {
            first_name,
            last_name,
            email,
            password,
            profile_image,
            is_admin: false,
            created_at: time,
            updated_at: time,
        };

        let ret_user = diesel::insert_into(users::table)
            .values(&to_insert)
            .get_result::<User>(conn)?;

        Ok(ret_user)
    }

    /** Returns an user with the id specified */
    pub fn find_by_id(conn: &mut SqliteConnection, user_id: i32) -> Result<User, AppError> {
        Ok(users::table.find(user_id).select(User::as_select()).first(conn)?)
    }

    pub fn find_by_email(conn: &mut SqliteConnection, email: &str) -> Result<Option<User>, AppError> {
        Ok(users::table
            .filter(users::email.eq(email))
            .select(User::as_select())
            .first(conn)
            .optional()?)
    }

    /// Whether another user (other than `except`) already uses this email
    pub fn email_taken(conn: &mut SqliteConnection, email: &str, except: Option<i32>) -> Result<bool, AppError> {
        let mut query = users::table.filter(users::email.eq(email)).into_boxed();
        if let Some(user_id) = except {
            query = query.filter(users::id.ne(user_id));
        }

        let count: i64 = query.count().get_result(conn)?;
        Ok(count > 0)
    }

    /** Returns every user, newest first */
    pub fn list(conn: &mut SqliteConnection) -> Result<Vec<User>, AppError> {
        Ok(users::table
            .select(User::as_select())
            .order((users::created_at.desc(), users::id.desc()))
            .load(conn)?)
    }

    pub fn edit(
        &mut self,
        conn: &mut SqliteConnection,
        first_name: &str,
        last_name: &str,
        email: &str,
    ) -> Result<(), AppError> {
        let time = Utc::now().naive_utc();

        *self = diesel::update(users::table.find(self.id))
            .set((
                users::first_name.eq(first_name),
                users::last_name.eq(last_name),
                users::email.eq(email),
                users::updated_at.eq(time),
            ))
            .get_result::<User>(conn)?;

        Ok(())
    }

    /** Deletes an user, tokens, blogs, comments and likes go with it through the foreign keys */
    pub fn delete(&self, conn: &mut SqliteConnection) -> Result<(), AppError> {
        diesel::delete(users::table.find(self.id)).execute(conn)?;
        Ok(())
    }

    /// Users may manage their own account, admins may manage anybody's
    pub fn can_be_managed_by(&self, actor: &User) -> bool {
        self.id == actor.id || actor.is_admin
    }

    pub fn with_relations(self, conn: &mut SqliteConnection) -> Result<UserProfile, AppError> {
        let mut profiles = User::load_profiles(conn, vec![self])?;
        profiles.pop().ok_or(AppError::NotFound)
    }

    /** Attaches blogs, comments and likes to each user, keeping the order of `users` */
    pub fn load_profiles(conn: &mut SqliteConnection, users: Vec<User>) -> Result<Vec<UserProfile>, AppError> {
        use crate::schema::{blogs, comments, likes};

        let blogs = Blog::belonging_to(&users)
            .select(Blog::as_select())
            .order((blogs::created_at.desc(), blogs::id.desc()))
            .load::<Blog>(conn)?
            .grouped_by(&users);
        let comments = Comment::belonging_to(&users)
            .select(Comment::as_select())
            .order((comments::created_at.desc(), comments::id.desc()))
            .load::<Comment>(conn)?
            .grouped_by(&users);
        let likes = Like::belonging_to(&users)
            .select(Like::as_select())
            .order(likes::id.asc())
            .load::<Like>(conn)?
            .grouped_by(&users);

        Ok(users
            .into_iter()
            .zip(blogs)
            .zip(comments)
            .zip(likes)
            .map(|(((user, blogs), comments), likes)| UserProfile {
                user,
                blogs,
                comments,
                likes,
            })
            .collect())
    }
}
