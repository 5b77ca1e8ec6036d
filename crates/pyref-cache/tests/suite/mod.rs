mod self_healing;
