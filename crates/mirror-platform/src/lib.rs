// Collaborator interfaces the mirror pipeline is built against

pub mod display;
pub mod events;
pub mod geometry;
pub mod orientation;
pub mod screen;
pub mod surface;
