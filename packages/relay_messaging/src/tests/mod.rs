mod receive_loop;
mod support;
