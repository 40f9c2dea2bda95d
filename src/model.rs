use crate::error::ValidationError;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    pub name: String,
}

impl User {
    pub fn new(name: &str) -> Result<Self, ValidationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::Blank("name"));
        }
        Ok(User {
            name: name.to_owned(),
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Movie {
    pub user_id: i64,
    pub name: String,
    pub director: String,
    pub year: i32,
    pub rating: f64,
    pub path: String,
}

impl Movie {
    /// Builds the record for a freshly looked up title. Director, year, rating
    /// and poster only ever come from the lookup at creation time.
    pub fn from_metadata(user_id: i64, title: &str, metadata: MovieMetadata) -> Self {
        Movie {
            user_id,
            name: title.trim().to_owned(),
            director: metadata.director,
            year: metadata.year,
            rating: metadata.rating,
            path: metadata.poster,
        }
    }
}

/// A persisted value together with its row id.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Keyed<T> {
    pub id: i64,
    #[serde(flatten)]
    pub value: T,
}

/// One row of the user/movie join.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct UserMovie {
    pub username: String,
    #[serde(flatten)]
    pub movie: Keyed<Movie>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MovieMetadata {
    pub year: i32,
    pub rating: f64,
    pub director: String,
    pub poster: String,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct MovieForm {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub director: String,
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub rating: String,
}

impl MovieForm {
    pub fn from_movie(movie: &Keyed<Movie>) -> Self {
        MovieForm {
            id: Some(movie.id.to_string()),
            name: movie.value.name.clone(),
            director: movie.value.director.clone(),
            year: movie.value.year.to_string(),
            rating: movie.value.rating.to_string(),
        }
    }

    /// Coerces the submitted strings into a movie owned by `user_id`. The
    /// poster path is not part of the form and is carried over unchanged.
    pub fn to_movie(&self, user_id: i64, path: String) -> Result<Movie, ValidationError> {
        let name = required("name", &self.name)?;
        let director = required("director", &self.director)?;
        let year = required("year", &self.year)?
            .parse::<i32>()
            .map_err(|_| ValidationError::NotNumeric("year"))?;
        let rating = required("rating", &self.rating)?
            .parse::<f64>()
            .ok()
            .filter(|r| r.is_finite())
            .ok_or(ValidationError::NotNumeric("rating"))?;
        Ok(Movie {
            user_id,
            name: name.to_owned(),
            director: director.to_owned(),
            year,
            rating,
            path,
        })
    }
}

fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        Err(ValidationError::Blank(field))
    } else {
        Ok(value)
    }
}
