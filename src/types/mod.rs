pub mod camera_id;
pub mod four_cc;
