pub mod destructure_ext;
