use chrono::{Duration, NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use rand::distributions::{Alphanumeric, DistString};
use sha256::digest;

use crate::{
    app::AppError,
    database::models::User,
    schema::{personal_access_tokens, users},
};

const SECRET_LENGTH: usize = 40;

/// Stored half of a bearer token. Only the SHA-256 of the secret is kept,
/// the plain text is handed out once when the token is created.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Associations)]
#[diesel(belongs_to(User))]
#[diesel(table_name = personal_access_tokens)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Token {
    pub id: i32,
    pub user_id: i32,
    /// Cosmetic label, the owner's first name
    pub name: String,
    pub token: String,
    pub created_at: NaiveDateTime,
    pub last_used_at: Option<NaiveDateTime>,
}

#[derive(Insertable)]
#[diesel(table_name = personal_access_tokens)]
struct TokenInsert<'a> {
    pub user_id: i32,
    pub name: &'a str,
    pub token: &'a str,
    pub created_at: NaiveDateTime,
}

/// A freshly minted token and its plain text form `<id>|<secret>`
#[derive(Debug)]
pub struct NewToken {
    pub token: Token,
    pub plain_text: String,
}

impl Token {
    pub fn new(conn: &mut SqliteConnection, user: &User, name: &str) -> Result<NewToken, AppError> {
        let secret = Alphanumeric.sample_string(&mut rand::thread_rng(), SECRET_LENGTH);
        let hashed = digest(secret.as_str());

        let token = diesel::insert_into(personal_access_tokens::table)
            .values(&TokenInsert {
                user_id: user.id,
                name,
                token: &hashed,
                created_at: Utc::now().naive_utc(),
            })
            .get_result::<Token>(conn)?;

        log::info!("issued token {} for user {}", token.id, user.id);

        Ok(NewToken {
            plain_text: format!("{}|{}", token.id, secret),
            token,
        })
    }

    /// Resolves a plain text token to its owner.
    /// Unknown, malformed and expired tokens are all `UnauthorizedError`,
    /// expired ones are removed on the way.
    pub fn find(
        conn: &mut SqliteConnection,
        plain_text: &str,
        ttl: Option<Duration>,
    ) -> Result<(Token, User), AppError> {
        let found = match plain_text.split_once('|') {
            Some((id, secret)) => {
                let id = id.parse::<i32>().map_err(|_| AppError::UnauthorizedError)?;
                personal_access_tokens::table
                    .inner_join(users::table)
                    .filter(personal_access_tokens::id.eq(id))
                    .filter(personal_access_tokens::token.eq(digest(secret)))
                    .select((Token::as_select(), User::as_select()))
                    .first::<(Token, User)>(conn)
                    .optional()?
            }
            None => personal_access_tokens::table
                .inner_join(users::table)
                .filter(personal_access_tokens::token.eq(digest(plain_text)))
                .select((Token::as_select(), User::as_select()))
                .first::<(Token, User)>(conn)
                .optional()?,
        };
        let (token, user) = found.ok_or(AppError::UnauthorizedError)?;

        let now = Utc::now().naive_utc();
        if let Some(ttl) = ttl {
            if token.created_at + ttl < now {
                log::info!("token {} of user {} expired", token.id, user.id);
                token.delete(conn)?;
                return Err(AppError::UnauthorizedError);
            }
        }

        diesel::update(personal_access_tokens::table.find(token.id))
            .set(personal_access_tokens::last_used_at.eq(Some(now)))
            .execute(conn)?;

        Ok((token, user))
    }

    pub fn delete(&self, conn: &mut SqliteConnection) -> Result<(), AppError> {
        diesel::delete(personal_access_tokens::table.find(self.id)).execute(conn)?;
        Ok(())
    }

    /** Revokes every token of the user, returns how many there were */
    pub fn delete_all_for_user(conn: &mut SqliteConnection, user_id: i32) -> Result<usize, AppError> {
        Ok(diesel::delete(personal_access_tokens::table.filter(personal_access_tokens::user_id.eq(user_id)))
            .execute(conn)?)
    }

    #[cfg(test)]
    pub fn count_for_user(conn: &mut SqliteConnection, user_id: i32) -> Result<i64, AppError> {
        Ok(personal_access_tokens::table
            .filter(personal_access_tokens::user_id.eq(user_id))
            .count()
            .get_result(conn)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{db_utils::test_pool, models::user::DEFAULT_PROFILE_IMAGE};
    use pretty_assertions::assert_eq;

    fn user(conn: &mut SqliteConnection) -> User {
        User::new(conn, "Ada", "Lovelace", "ada@example.com", "hash", DEFAULT_PROFILE_IMAGE).unwrap()
    }

    #[test]
    fn test_token_roundtrip() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        let user = user(&mut conn);

        let issued = Token::new(&mut conn, &user, &user.first_name).unwrap();
        let (id, secret) = issued.plain_text.split_once('|').unwrap();
        assert_eq!(id, issued.token.id.to_string());
        assert_eq!(secret.len(), SECRET_LENGTH);
        assert_ne!(issued.token.token, secret);
        assert_eq!(issued.token.name, "Ada");

        let (token, owner) = Token::find(&mut conn, &issued.plain_text, None).unwrap();
        assert_eq!(owner.id, user.id);
        assert_eq!(token.id, issued.token.id);

        // The bare secret resolves too
        assert!(Token::find(&mut conn, secret, None).is_ok());
    }

    #[test]
    fn test_token_rejects_garbage() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        let user = user(&mut conn);
        let issued = Token::new(&mut conn, &user, "Ada").unwrap();
        let (id, _) = issued.plain_text.split_once('|').unwrap();

        for bad in ["", "nonsense", "abc|def", &format!("{}|wrongsecret", id)] {
            assert!(matches!(Token::find(&mut conn, bad, None), Err(AppError::UnauthorizedError)));
        }
    }

    #[test]
    fn test_expired_token_is_removed() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        let user = user(&mut conn);
        let issued = Token::new(&mut conn, &user, "Ada").unwrap();

        diesel::update(personal_access_tokens::table.find(issued.token.id))
            .set(personal_access_tokens::created_at.eq(Utc::now().naive_utc() - Duration::minutes(61)))
            .execute(&mut conn)
            .unwrap();

        assert!(Token::find(&mut conn, &issued.plain_text, Some(Duration::minutes(120))).is_ok());
        assert!(matches!(
            Token::find(&mut conn, &issued.plain_text, Some(Duration::minutes(60))),
            Err(AppError::UnauthorizedError)
        ));
        assert_eq!(Token::count_for_user(&mut conn, user.id).unwrap(), 0);
    }

    #[test]
    fn test_delete_all_for_user() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        let user = user(&mut conn);
        let first = Token::new(&mut conn, &user, "Ada").unwrap();
        let second = Token::new(&mut conn, &user, "Ada").unwrap();

        assert_eq!(Token::delete_all_for_user(&mut conn, user.id).unwrap(), 2);
        assert!(Token::find(&mut conn, &first.plain_text, None).is_err());
        assert!(Token::find(&mut conn, &second.plain_text, None).is_err());
    }

    #[test]
    fn test_tokens_cascade_with_user() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        let user = user(&mut conn);
        Token::new(&mut conn, &user, "Ada").unwrap();

        user.delete(&mut conn).unwrap();
        assert_eq!(Token::count_for_user(&mut conn, user.id).unwrap(), 0);
    }
}
