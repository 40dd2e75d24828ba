use crate::{
    catalog::Catalog,
    config::Config,
    file::{Location, base_name, get_response},
    resolver::{Resolution, Resolver},
};
use anyhow::{Error, Result, bail};
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use rand::{Rng, rng};
use std::{
    io::{Cursor, Empty},
    net::{Ipv4Addr, SocketAddrV4},
    path::PathBuf,
};
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};
use tracing::{error, info, warn};

const CORS_HEADERS: [(&str, &str); 3] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "GET"),
    (
        "Access-Control-Allow-Headers",
        "Origin, X-Requested-With, Content-Type, Accept, Authorization",
    ),
];

/// Bytes escaped in a redirect target. Non-ASCII is always escaped.
const LOCATION: &AsciiSet = &CONTROLS.add(b' ').add(b'"');

/// What a request ends up being answered with.
#[derive(Debug, PartialEq)]
pub enum Reply {
    File(PathBuf),
    Redirect(String),
    NotFound,
}

impl From<&Location> for Reply {
    fn from(location: &Location) -> Self {
        match location {
            Location::Local(path) => Self::File(path.clone()),
            Location::Remote(url) => Self::Redirect(url.clone()),
        }
    }
}

pub struct RandomFileServer {
    config: Config,
    resolver: Resolver,
    public: Catalog,
    assets: Catalog,
}

impl RandomFileServer {
    pub fn new(config: Config, public: Catalog, assets: Catalog) -> Self {
        let resolver = Resolver::new(config.protected_names.clone(), config.singleton_policy);

        Self {
            config,
            resolver,
            public,
            assets,
        }
    }

    pub fn start(&self) -> Result<()> {
        let Ok(server) = Server::http(SocketAddrV4::new(
            Ipv4Addr::new(0, 0, 0, 0),
            self.config.port,
        )) else {
            bail!("Could not create server on port {}", self.config.port);
        };

        info!(
            "Random File Server started! Port: {}, Public: {} ({} files), Assets: {} ({} files), Singleton Policy: {:?}",
            self.config.port,
            self.config.public_dir.display(),
            self.public.len(),
            self.config.assets_file.display(),
            self.assets.len(),
            self.config.singleton_policy,
        );

        if self.public.is_empty() && self.assets.is_empty() {
            warn!("Both catalogs are empty, every substitutable request will be answered with 404");
        }

        for request in server.incoming_requests() {
            if let Err(error) = self.handle(request) {
                error!("Error while processing request: {error:#}");
            }
        }

        Ok(())
    }

    fn handle(&self, request: Request) -> Result<()> {
        match self.route(request.method(), request.url(), &mut rng()) {
            Reply::File(path) => match get_response(&path) {
                Ok(response) => request.respond(response)?,
                Err(error) => {
                    warn!("{error:#}");
                    request.respond(not_found())?;
                }
            },
            Reply::Redirect(location) => request.respond(redirect(&location)?)?,
            Reply::NotFound => request.respond(not_found())?,
        }

        Ok(())
    }

    fn route<R: Rng + ?Sized>(&self, method: &Method, url: &str, rng: &mut R) -> Reply {
        if !matches!(method, Method::Get | Method::Head) {
            return Reply::NotFound;
        }

        let path = decode_path(url.split('?').next().unwrap_or_default());

        if path == "/" {
            return Reply::File(self.config.public_dir.join(&self.config.index_file));
        }

        for (prefix, catalog) in [("/public", &self.public), ("/assets", &self.assets)] {
            let Some(scoped_path) = scope(&path, prefix) else {
                continue;
            };

            match self.resolver.resolve(scoped_path, catalog, rng) {
                Resolution::Substitute(file) => return Reply::from(&file.location),
                Resolution::NotFound => return Reply::NotFound,
                Resolution::Literal => break,
            }
        }

        self.find_literal(&path)
    }

    /// Exact base-name lookup across both catalogs, assets first.
    fn find_literal(&self, path: &str) -> Reply {
        let name = base_name(path);
        let file = self
            .assets
            .find_by_name(name)
            .or_else(|| self.public.find_by_name(name));

        match file {
            Some(file) => {
                info!("Request for {path} served literally");
                Reply::from(&file.location)
            }
            None => {
                warn!("Request for {path} not found");
                Reply::NotFound
            }
        }
    }
}

/// Decodes each segment on its own so an escaped `/` stays escaped.
fn decode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| percent_decode_str(segment).decode_utf8_lossy().replace('/', "%2F"))
        .collect::<Vec<String>>()
        .join("/")
}

/// Path relative to `prefix`, if `path` lies under it.
fn scope<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(prefix)?;

    if rest.is_empty() {
        Some("/")
    } else if rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

fn redirect(location: &str) -> Result<Response<Empty>> {
    let location = utf8_percent_encode(location, LOCATION).to_string();
    let mut response = Response::empty(StatusCode(302)).with_header(header("location", &location)?);

    for (field, value) in CORS_HEADERS {
        response = response.with_header(header(field, value)?);
    }

    Ok(response)
}

fn header(field: &str, value: &str) -> Result<Header> {
    Header::from_bytes(field, value).map_err(|_| Error::msg("Could not create header"))
}

fn not_found() -> Response<Cursor<Vec<u8>>> {
    Response::from_string("Not Found").with_status_code(StatusCode(404))
}
