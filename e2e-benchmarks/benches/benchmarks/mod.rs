pub mod benchtemplate;
pub mod joinbench;
pub mod querybench;
