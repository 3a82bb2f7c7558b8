use crate::db::models::{NewUser, User};
use crate::errors::Error;
use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

/// Repository for API users
pub struct UserRepository<'a> {
    pub conn: &'a mut SqliteConnection,
}

impl<'a> UserRepository<'a> {
    pub fn new(conn: &'a mut SqliteConnection) -> Self {
        UserRepository { conn }
    }

    /// Inserts a user with an already hashed bearer token.
    pub fn create_user(&mut self, the_username: &str, the_token_hash: &str) -> Result<User, Error> {
        use crate::schema::users::dsl::*;

        diesel::insert_into(users)
            .values(&NewUser {
                username: the_username,
                token_hash: the_token_hash,
                created_at: Utc::now().naive_utc(),
            })
            .execute(self.conn)?;

        let stored = users
            .filter(username.eq(the_username))
            .select(User::as_select())
            .first(self.conn)?;
        Ok(stored)
    }

    /// Resolves a token hash to its user.
    pub fn find_by_token_hash(&mut self, the_token_hash: &str) -> Result<Option<User>, Error> {
        use crate::schema::users::dsl::*;

        let found = users
            .filter(token_hash.eq(the_token_hash))
            .select(User::as_select())
            .first(self.conn)
            .optional()?;
        Ok(found)
    }
}
