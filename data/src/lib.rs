extern crate broadphase_bvh as broadphase;

extern crate bincode;
extern crate cgmath;

#[macro_use]
extern crate serde;

use broadphase::{Bodies, Body, Collider};

use std::fs::File;
use std::path::Path;

const FORMAT_SIGNATURE: [u8;8] = *b"BVHSCENE";
const FORMAT_VERSION: (u16, u16) = (1, 0);

#[derive(Deserialize, Serialize)]
struct Header {
    signature: [u8;8],
    version: (u16, u16)
}

/// A set of bodies, as `(shape, padding)`, which can be written to and read from disk
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Scene {
    pub bodies: Vec<(Collider, f32)>
}

#[derive(Debug)]
pub enum SceneIOError {
    IOError(std::io::Error),
    BincodeError(bincode::Error),
    InvalidSignature([u8;8]),
    InvalidVersion((u16, u16))
}

impl Scene {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Scene, SceneIOError> {
        let f = File::open(path)
            .map_err(SceneIOError::IOError)?;

        let header: Header = bincode::deserialize_from(&f)
            .map_err(SceneIOError::BincodeError)?;

        if header.signature != FORMAT_SIGNATURE {
            return Err(SceneIOError::InvalidSignature(header.signature));
        }

        if header.version.0 != FORMAT_VERSION.0 {
            return Err(SceneIOError::InvalidVersion(header.version));
        }

        bincode::deserialize_from::<_, Scene>(f)
            .map_err(SceneIOError::BincodeError)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), SceneIOError> {
        let f = File::create(path)
            .map_err(SceneIOError::IOError)?;

        bincode::serialize_into(&f, &Header{
            signature: FORMAT_SIGNATURE,
            version: FORMAT_VERSION
        }).map_err(SceneIOError::BincodeError)?;

        bincode::serialize_into(f, self)
            .map_err(SceneIOError::BincodeError)
    }

    /// Copy every body into a fresh store, in scene order
    pub fn to_bodies(&self) -> Bodies<Collider> {
        let mut bodies = Bodies::with_capacity(self.bodies.len());
        for (shape, padding) in &self.bodies {
            bodies.add(Body::with_padding(shape.clone(), *padding));
        }
        bodies
    }
}
