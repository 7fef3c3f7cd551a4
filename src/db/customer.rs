use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;

use crate::accounts::Account;

#[derive(Clone)]
pub struct CustomerStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "MALE",
            Gender::Female => "FEMALE",
        }
    }

}

/// A gender string that is neither `MALE` nor `FEMALE`.
#[derive(Debug)]
pub struct UnknownGender(String);

impl std::fmt::Display for UnknownGender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Unknown gender: {:?}", self.0)
    }
}

impl std::error::Error for UnknownGender {}

impl FromStr for Gender {
    type Err = UnknownGender;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MALE" => Ok(Gender::Male),
            "FEMALE" => Ok(Gender::Female),
            _ => Err(UnknownGender(s.to_string())),
        }
    }
}

/// Role every self-registered customer receives.
pub const DEFAULT_ROLE: &str = "ROLE_USER";

#[derive(Debug, Clone)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub age: i64,
    pub gender: Gender,
    pub roles: Vec<String>,
}

/// Fields for a new customer. The password must already be hashed.
#[derive(Debug, Clone)]
pub struct NewCustomer<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub age: i64,
    pub gender: Gender,
}

#[derive(sqlx::FromRow)]
struct CustomerRow {
    id: i64,
    name: String,
    email: String,
    password: String,
    age: i64,
    gender: String,
    roles: String,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = sqlx::Error;

    /// Fails on a stored gender that does not parse rather than guessing.
    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        let gender = row
            .gender
            .parse()
            .map_err(|e: UnknownGender| sqlx::Error::Decode(Box::new(e)))?;

        Ok(Self {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password,
            age: row.age,
            gender,
            roles: row
                .roles
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(String::from)
                .collect(),
        })
    }
}

impl From<Customer> for Account {
    fn from(customer: Customer) -> Self {
        Self {
            username: customer.email,
            password_hash: customer.password_hash,
            authorities: customer.roles,
        }
    }
}

/// Public customer view. Never exposes the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerSummary {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub age: i64,
    pub gender: Gender,
    pub roles: Vec<String>,
    pub username: String,
}

impl From<&Customer> for CustomerSummary {
    fn from(c: &Customer) -> Self {
        Self {
            id: c.id,
            name: c.name.clone(),
            email: c.email.clone(),
            age: c.age,
            gender: c.gender,
            roles: c.roles.clone(),
            username: c.email.clone(),
        }
    }
}

impl CustomerStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a customer with the default role. Returns the new ID.
    pub async fn create(&self, customer: &NewCustomer<'_>) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO customers (name, email, password, age, gender, roles) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(customer.name)
        .bind(customer.email)
        .bind(customer.password_hash)
        .bind(customer.age)
        .bind(customer.gender.as_str())
        .bind(DEFAULT_ROLE)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Customer>, sqlx::Error> {
        let row: Option<CustomerRow> = sqlx::query_as(
            "SELECT id, name, email, password, age, gender, roles FROM customers WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Customer::try_from).transpose()
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<Customer>, sqlx::Error> {
        let row: Option<CustomerRow> = sqlx::query_as(
            "SELECT id, name, email, password, age, gender, roles FROM customers WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Customer::try_from).transpose()
    }

    pub async fn exists_by_email(&self, email: &str) -> Result<bool, sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM customers WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0 > 0)
    }

    /// List all customers ordered by ID.
    pub async fn list(&self) -> Result<Vec<Customer>, sqlx::Error> {
        let rows: Vec<CustomerRow> = sqlx::query_as(
            "SELECT id, name, email, password, age, gender, roles FROM customers ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Customer::try_from).collect()
    }

    /// Write name, email and age back for an existing customer.
    pub async fn update(&self, customer: &Customer) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE customers SET name = ?, email = ?, age = ? WHERE id = ?")
            .bind(&customer.name)
            .bind(&customer.email)
            .bind(customer.age)
            .bind(customer.id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM customers WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
