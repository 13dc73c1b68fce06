mod cam_table;
mod forwarding;
