use crate::database::{DbError, DbPool, MovieDb, UserDb};
use crate::error::{AppError, ValidationError};
use crate::lookup::MovieLookup;
use crate::model::*;
use actix_web::{
    body::BoxBody,
    dev::ServiceResponse,
    http::{
        header::{self, ContentType},
        StatusCode,
    },
    middleware::{ErrorHandlerResponse, ErrorHandlers},
    web, HttpResponse,
};
use serde::Deserialize;
use tera::Context;

type Tera = web::Data<tera::Tera>;
type Db = web::Data<DbPool>;
type Lookup = web::Data<dyn MovieLookup>;
type HandlerResult = Result<HttpResponse, AppError>;

pub fn templates() -> Result<tera::Tera, tera::Error> {
    tera::Tera::new(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/**/*"))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .route("/users", web::get().to(list_users))
        .route("/users/{user_id}", web::get().to(user_movies))
        .route("/add_user", web::get().to(add_user_form))
        .route("/add_user", web::post().to(add_user))
        .route("/users/{user_id}/add_movie", web::get().to(add_movie_form))
        .route("/users/{user_id}/add_movie", web::post().to(add_movie))
        .route(
            "/users/{user_id}/update_movie/{movie_id}",
            web::get().to(update_movie_form),
        )
        .route(
            "/users/{user_id}/update_movie/{movie_id}",
            web::post().to(update_movie),
        )
        .route(
            "/users/{user_id}/delete_movie/{movie_id}",
            web::get().to(delete_movie),
        )
        .route("/users/{user_id}/delete_user", web::get().to(delete_user));
}

/// Replaces the body of every 404 and 500 response with the matching page.
pub fn error_handlers() -> ErrorHandlers<BoxBody> {
    ErrorHandlers::new()
        .handler(StatusCode::NOT_FOUND, |res| error_page(res, "404.html"))
        .handler(StatusCode::INTERNAL_SERVER_ERROR, |res| {
            error_page(res, "500.html")
        })
}

fn error_page(
    res: ServiceResponse<BoxBody>,
    template: &str,
) -> actix_web::Result<ErrorHandlerResponse<BoxBody>> {
    let status = res.status();
    let body = res
        .request()
        .app_data::<Tera>()
        .and_then(|tera| match tera.render(template, &Context::new()) {
            Ok(body) => Some(body),
            Err(err) => {
                log::error!("could not render {}: {:?}", template, err);
                None
            }
        });
    let response = match body {
        Some(body) => HttpResponse::build(status)
            .content_type(ContentType::html())
            .body(body),
        None => HttpResponse::build(status)
            .content_type(ContentType::plaintext())
            .body(status.canonical_reason().unwrap_or("Error")),
    };
    Ok(ErrorHandlerResponse::Response(ServiceResponse::new(
        res.into_parts().0,
        response.map_into_left_body(),
    )))
}

fn render(tera: &tera::Tera, status: StatusCode, template: &str, ctx: &Context) -> HandlerResult {
    let body = tera.render(template, ctx)?;
    Ok(HttpResponse::build(status)
        .content_type(ContentType::html())
        .body(body))
}

fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .append_header((header::LOCATION, location))
        .finish()
}

fn status_for(message: Option<&ValidationError>) -> StatusCode {
    if message.is_some() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    }
}

#[derive(Deserialize)]
struct NameForm {
    #[serde(default)]
    name: String,
}

async fn index(tera: Tera) -> HandlerResult {
    render(&tera, StatusCode::OK, "index.html", &Context::new())
}

async fn list_users(tera: Tera, db: Db) -> HandlerResult {
    let pool = db.get_ref().clone();
    let users = web::block(move || pool.list_users()).await??;
    let mut ctx = Context::new();
    ctx.insert("users", &users);
    render(&tera, StatusCode::OK, "users.html", &ctx)
}

async fn user_movies(tera: Tera, db: Db, path: web::Path<i64>) -> HandlerResult {
    let user_id = path.into_inner();
    let pool = db.get_ref().clone();
    let movies = web::block(move || pool.list_movies_for_user(user_id)).await??;
    let username = match movies.first() {
        Some(row) => row.username.clone(),
        None => return Err(AppError::not_found(format!("movies of user {}", user_id))),
    };
    let mut ctx = Context::new();
    ctx.insert("user_id", &user_id);
    ctx.insert("username", &username);
    ctx.insert("movies", &movies);
    render(&tera, StatusCode::OK, "user_movies.html", &ctx)
}

fn add_user_page(tera: &tera::Tera, name: &str, message: Option<&ValidationError>) -> HandlerResult {
    let mut ctx = Context::new();
    ctx.insert("name", name);
    if let Some(message) = message {
        ctx.insert("message", &message.to_string());
    }
    render(tera, status_for(message), "add_user.html", &ctx)
}

async fn add_user_form(tera: Tera) -> HandlerResult {
    add_user_page(&tera, "", None)
}

async fn add_user(tera: Tera, db: Db, form: web::Form<NameForm>) -> HandlerResult {
    let user = match User::new(&form.name) {
        Ok(user) => user,
        Err(err) => return add_user_page(&tera, &form.name, Some(&err)),
    };
    let name = user.name.clone();
    let pool = db.get_ref().clone();
    match web::block(move || pool.add_user(&user)).await?? {
        Some(_) => Ok(redirect("/users")),
        None => add_user_page(&tera, &name, Some(&ValidationError::DuplicateName(name.clone()))),
    }
}

/// All users plus the one addressed by the path, or 404.
async fn users_with(db: &Db, user_id: i64) -> Result<(Vec<Keyed<User>>, Keyed<User>), AppError> {
    let pool = db.get_ref().clone();
    let found = web::block(move || -> Result<_, DbError> {
        match pool.get_user(user_id)? {
            Some(user) => Ok(Some((pool.list_users()?, user))),
            None => Ok(None),
        }
    })
    .await??;
    found.ok_or_else(|| AppError::not_found(format!("user {}", user_id)))
}

fn add_movie_page(
    tera: &tera::Tera,
    users: &[Keyed<User>],
    user: &Keyed<User>,
    message: Option<&ValidationError>,
) -> HandlerResult {
    let mut ctx = Context::new();
    ctx.insert("users", users);
    ctx.insert("user", user);
    if let Some(message) = message {
        ctx.insert("message", &message.to_string());
    }
    render(tera, status_for(message), "add_movie.html", &ctx)
}

async fn add_movie_form(tera: Tera, db: Db, path: web::Path<i64>) -> HandlerResult {
    let (users, user) = users_with(&db, path.into_inner()).await?;
    add_movie_page(&tera, &users, &user, None)
}

async fn add_movie(
    tera: Tera,
    db: Db,
    lookup: Lookup,
    path: web::Path<i64>,
    form: web::Form<NameForm>,
) -> HandlerResult {
    let (users, user) = users_with(&db, path.into_inner()).await?;
    let title = form.name.trim();
    if title.is_empty() {
        return add_movie_page(&tera, &users, &user, Some(&ValidationError::Blank("name")));
    }

    let metadata = lookup.fetch_movie(title).await?;
    let movie = Movie::from_metadata(user.id, title, metadata);
    let pool = db.get_ref().clone();
    web::block(move || pool.add_movie(&movie)).await??;
    Ok(redirect("/"))
}

/// The movie addressed by the path, or 404 when it is missing or belongs to
/// someone else.
async fn owned_movie(db: &Db, user_id: i64, movie_id: i64) -> Result<Keyed<Movie>, AppError> {
    let pool = db.get_ref().clone();
    web::block(move || pool.get_movie(movie_id))
        .await??
        .filter(|m| m.value.user_id == user_id)
        .ok_or_else(|| AppError::not_found(format!("movie {} of user {}", movie_id, user_id)))
}

fn update_movie_page(
    tera: &tera::Tera,
    user_id: i64,
    movie_id: i64,
    form: &MovieForm,
    message: Option<&ValidationError>,
) -> HandlerResult {
    let mut ctx = Context::new();
    ctx.insert("user_id", &user_id);
    ctx.insert("movie_id", &movie_id);
    ctx.insert("movie", form);
    if let Some(message) = message {
        ctx.insert("message", &message.to_string());
    }
    render(tera, status_for(message), "update_movie.html", &ctx)
}

async fn update_movie_form(tera: Tera, db: Db, path: web::Path<(i64, i64)>) -> HandlerResult {
    let (user_id, movie_id) = path.into_inner();
    let movie = owned_movie(&db, user_id, movie_id).await?;
    update_movie_page(&tera, user_id, movie_id, &MovieForm::from_movie(&movie), None)
}

async fn update_movie(
    tera: Tera,
    db: Db,
    path: web::Path<(i64, i64)>,
    form: web::Form<MovieForm>,
) -> HandlerResult {
    let (user_id, movie_id) = path.into_inner();
    let existing = owned_movie(&db, user_id, movie_id).await?;
    let movie = match form.to_movie(user_id, existing.value.path) {
        Ok(movie) => movie,
        Err(err) => return update_movie_page(&tera, user_id, movie_id, &form, Some(&err)),
    };

    let pool = db.get_ref().clone();
    if !web::block(move || pool.update_movie(movie_id, &movie)).await?? {
        return Err(AppError::not_found(format!("movie {}", movie_id)));
    }
    Ok(redirect("/"))
}

async fn delete_movie(db: Db, path: web::Path<(i64, i64)>) -> HandlerResult {
    let (user_id, movie_id) = path.into_inner();
    let pool = db.get_ref().clone();
    let foreign = web::block(move || -> Result<bool, DbError> {
        match pool.get_movie(movie_id)? {
            Some(movie) if movie.value.user_id != user_id => Ok(true),
            Some(_) => pool.delete_movie(movie_id).map(|_| false),
            None => Ok(false),
        }
    })
    .await??;
    if foreign {
        return Err(AppError::not_found(format!("movie {} of user {}", movie_id, user_id)));
    }
    Ok(redirect("/users"))
}

async fn delete_user(db: Db, path: web::Path<i64>) -> HandlerResult {
    let user_id = path.into_inner();
    let pool = db.get_ref().clone();
    web::block(move || pool.delete_user(user_id)).await??;
    Ok(redirect("/users"))
}
